//! Output classification utilities
//!
//! Pure post-processing of captured test output into structured signals
//! for reporting: status markers, assertion failures, performance
//! metrics, filtering, and terminal colorizing. Never touches a live
//! process.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::ExecutionStatus;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

fn assertion_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s+assertions?\s+(?:passed|failed)").expect("assertion count pattern")
    })
}

fn assertion_failure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ASSERTION FAILED:([^\n]+)").expect("assertion failure pattern"))
}

fn metric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+):\s*(\d+(?:\.\d+)?)\s*ms").expect("metric pattern"))
}

fn timeout_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"timeout|TIMEOUT").expect("timeout pattern"))
}

/// Extract coarse structured information from raw test output.
///
/// Returns a map with a `status` entry when a PASSED/FAILED marker is
/// present and an `assertions` entry when a reported assertion count is
/// found.
pub fn parse_test_output(output: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();

    if output.contains("PASSED") {
        parsed.insert("status".to_string(), "passed".to_string());
    } else if output.contains("FAILED") {
        parsed.insert("status".to_string(), "failed".to_string());
    }

    if let Some(captures) = assertion_count_re().captures(output) {
        parsed.insert("assertions".to_string(), captures[1].to_string());
    }

    parsed
}

/// Collect the literal text of every assertion-failure line
pub fn extract_assertion_failures(output: &str) -> Vec<String> {
    assertion_failure_re()
        .captures_iter(output)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Collect labelled timing metrics of the form `<label>: <number> ms`
pub fn extract_performance_metrics(output: &str) -> HashMap<String, f64> {
    metric_re()
        .captures_iter(output)
        .filter_map(|captures| {
            captures[2]
                .parse::<f64>()
                .ok()
                .map(|value| (captures[1].to_string(), value))
        })
        .collect()
}

/// Retain only lines bearing status, error, or assertion markers.
///
/// Lines tagged `DEBUG:` are dropped unless `include_debug` is set; the
/// marker check still applies to them.
pub fn filter_output(output: &str, include_debug: bool) -> String {
    let mut filtered = String::new();

    for line in output.lines() {
        if !include_debug && line.contains("DEBUG:") {
            continue;
        }

        if line.contains("PASSED")
            || line.contains("FAILED")
            || line.contains("ERROR")
            || line.contains("ASSERTION")
        {
            filtered.push_str(line);
            filtered.push('\n');
        }
    }

    filtered
}

/// Highlight pass/fail/timeout tokens with ANSI colors for terminal display
pub fn colorize_output(output: &str, status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Success => output.replace("PASSED", &format!("{GREEN}PASSED{RESET}")),
        ExecutionStatus::Failure => output.replace("FAILED", &format!("{RED}FAILED{RESET}")),
        ExecutionStatus::Timeout => timeout_re()
            .replace_all(output, format!("{YELLOW}$0{RESET}"))
            .into_owned(),
        _ => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_markers() {
        let parsed = parse_test_output("setup\nAll 12 checks PASSED\n");
        assert_eq!(parsed.get("status").map(String::as_str), Some("passed"));

        let parsed = parse_test_output("check 3 FAILED\n");
        assert_eq!(parsed.get("status").map(String::as_str), Some("failed"));

        let parsed = parse_test_output("nothing conclusive\n");
        assert!(parsed.get("status").is_none());
    }

    #[test]
    fn test_parse_assertion_count() {
        let parsed = parse_test_output("PASSED\n42 assertions passed\n");
        assert_eq!(parsed.get("assertions").map(String::as_str), Some("42"));

        let parsed = parse_test_output("FAILED\n1 assertion failed\n");
        assert_eq!(parsed.get("assertions").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_extract_assertion_failures() {
        let output = "\
ASSERTION FAILED: expected 4 frames, got 3
some unrelated noise
ASSERTION FAILED: buffer underrun at sample 1024
";
        let failures = extract_assertion_failures(output);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("expected 4 frames"));
        assert!(failures[1].contains("buffer underrun"));
    }

    #[test]
    fn test_extract_performance_metrics() {
        let output = "decode: 12.5 ms\nseek: 3 ms\nirrelevant line\n";
        let metrics = extract_performance_metrics(output);

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get("decode"), Some(&12.5));
        assert_eq!(metrics.get("seek"), Some(&3.0));
    }

    #[test]
    fn test_filter_output_drops_noise_and_debug() {
        let output = "\
starting up
DEBUG: probing codec
test_a PASSED
DEBUG: ERROR simulation enabled
test_b FAILED
plain progress line
";
        let filtered = filter_output(output, false);
        assert!(filtered.contains("test_a PASSED"));
        assert!(filtered.contains("test_b FAILED"));
        assert!(!filtered.contains("probing codec"));
        assert!(!filtered.contains("ERROR simulation"));
        assert!(!filtered.contains("progress line"));

        // With debug included, marker-bearing debug lines survive
        let filtered = filter_output(output, true);
        assert!(filtered.contains("ERROR simulation"));
        assert!(!filtered.contains("probing codec"));
    }

    #[test]
    fn test_colorize_by_status() {
        let colorized = colorize_output("all PASSED", ExecutionStatus::Success);
        assert!(colorized.contains("\x1b[32mPASSED\x1b[0m"));

        let colorized = colorize_output("check FAILED", ExecutionStatus::Failure);
        assert!(colorized.contains("\x1b[31mFAILED\x1b[0m"));

        let colorized = colorize_output("hit timeout after 200ms", ExecutionStatus::Timeout);
        assert!(colorized.contains("\x1b[33mtimeout\x1b[0m"));

        // Other statuses pass through untouched
        let colorized = colorize_output("PASSED FAILED", ExecutionStatus::Crash);
        assert_eq!(colorized, "PASSED FAILED");
    }
}
