//! Output post-processing
//!
//! Structured classification of captured test output.

mod classify;

pub use classify::{
    colorize_output, extract_assertion_failures, extract_performance_metrics, filter_output,
    parse_test_output,
};
