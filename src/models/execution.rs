//! Execution result models
//!
//! Defines the status taxonomy, per-test result records, and run summaries.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified outcome of one test execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Test completed with exit code 0
    Success,
    /// Test ran to completion with a non-zero exit code
    Failure,
    /// Test exceeded its time limit and was terminated by the engine
    Timeout,
    /// Test was terminated by a signal
    Crash,
    /// Test executable missing or not executable; never spawned
    BuildError,
    /// Engine-level failure while spawning or waiting
    SystemError,
}

impl ExecutionStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "✓",
            ExecutionStatus::Failure => "✗",
            ExecutionStatus::Timeout => "⏱",
            ExecutionStatus::Crash => "💥",
            ExecutionStatus::BuildError => "⚙",
            ExecutionStatus::SystemError => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "SUCCESS"),
            ExecutionStatus::Failure => write!(f, "FAILURE"),
            ExecutionStatus::Timeout => write!(f, "TIMEOUT"),
            ExecutionStatus::Crash => write!(f, "CRASH"),
            ExecutionStatus::BuildError => write!(f, "BUILD ERROR"),
            ExecutionStatus::SystemError => write!(f, "SYSTEM ERROR"),
        }
    }
}

/// Detailed result of a single test execution.
///
/// Created at the start of execution and filled progressively as the
/// supervisor observes events; immutable once returned to the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub test_name: String,
    pub status: ExecutionStatus,
    /// Process exit code; meaningful only for Success/Failure
    pub exit_code: i32,
    /// Terminating signal; non-zero only for Crash
    pub signal_number: i32,
    /// Wall clock from spawn to termination-observed
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
    /// Human-readable description; non-empty whenever status != Success
    pub error_message: String,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Create an empty record for a named test
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            status: ExecutionStatus::SystemError,
            exit_code: -1,
            signal_number: 0,
            duration_ms: 0,
            stdout: String::new(),
            stderr: String::new(),
            error_message: String::new(),
            timed_out: false,
        }
    }

    /// Record for a test whose executable could not be validated
    pub fn build_error(test_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(test_name);
        result.status = ExecutionStatus::BuildError;
        result.error_message = message.into();
        result
    }

    /// Record for an engine-level failure
    pub fn system_error(test_name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(test_name);
        result.status = ExecutionStatus::SystemError;
        result.error_message = message.into();
        result
    }

    /// Record for a test skipped because shutdown was requested
    pub fn cancelled(test_name: impl Into<String>) -> Self {
        Self::system_error(test_name, "Execution cancelled")
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}ms]",
            self.status.symbol(),
            self.test_name,
            self.status,
            self.duration_ms
        )?;
        if !self.error_message.is_empty() {
            write!(f, " - {}", self.error_message)?;
        }
        Ok(())
    }
}

/// Summary of a full run, handed to the reporter alongside the records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub crashed: usize,
    pub build_errors: usize,
    pub system_errors: usize,
    pub total_duration_ms: u64,
    pub results: Vec<ExecutionResult>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, results: Vec<ExecutionResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();

        Self {
            started_at,
            total: results.len(),
            passed: count(ExecutionStatus::Success),
            failed: count(ExecutionStatus::Failure),
            timed_out: count(ExecutionStatus::Timeout),
            crashed: count(ExecutionStatus::Crash),
            build_errors: count(ExecutionStatus::BuildError),
            system_errors: count(ExecutionStatus::SystemError),
            total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
            results,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Timeout: {} | Crash: {} | Build: {} | System: {}",
            self.total,
            self.passed,
            self.failed,
            self.timed_out,
            self.crashed,
            self.build_errors,
            self.system_errors
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_defaults() {
        let result = ExecutionResult::new("test_demuxer");
        assert_eq!(result.status, ExecutionStatus::SystemError);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.signal_number, 0);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_build_error_record() {
        let result = ExecutionResult::build_error("test_x", "Test executable not found: /x");
        assert_eq!(result.status, ExecutionStatus::BuildError);
        assert!(!result.error_message.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let mut ok = ExecutionResult::new("a");
        ok.status = ExecutionStatus::Success;
        ok.exit_code = 0;
        ok.duration_ms = 100;

        let mut failed = ExecutionResult::new("b");
        failed.status = ExecutionStatus::Failure;
        failed.exit_code = 1;
        failed.duration_ms = 50;

        let mut slow = ExecutionResult::new("c");
        slow.status = ExecutionStatus::Timeout;
        slow.timed_out = true;
        slow.duration_ms = 200;

        let summary = RunSummary::new(Utc::now(), vec![ok, failed, slow]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.total_duration_ms, 350);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_pass_rate_empty() {
        let summary = RunSummary::new(Utc::now(), Vec::new());
        assert_eq!(summary.pass_rate(), 0.0);
    }
}
