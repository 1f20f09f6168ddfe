//! Test execution engine
//!
//! Process supervision plus sequential and parallel test execution.

mod process;
mod registry;
mod runner;

use std::sync::Arc;

/// Callback invoked with (test name, combined output chunk) as output arrives
pub type OutputCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

pub use runner::{ExecutorConfig, TestExecutor};
