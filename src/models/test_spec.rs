//! Test descriptors
//!
//! The boundary with the discovery subsystem: the engine consumes these
//! records and never builds the catalog itself.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single discovered test, ready for execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestSpec {
    /// Logical test name used in results and logs
    pub name: String,

    /// Full path to the test executable
    pub executable: PathBuf,

    /// Per-test timeout override; `None` or zero means the engine default
    pub timeout: Option<Duration>,
}

impl TestSpec {
    /// Create a new test descriptor
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Build a descriptor from a path, deriving the name from the file stem
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self::new(name, path)
    }

    /// Set a per-test timeout override
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve the timeout that applies to this test
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        match self.timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_uses_file_stem() {
        let spec = TestSpec::from_path("/tmp/tests/test_flac_decode");
        assert_eq!(spec.name, "test_flac_decode");
        assert_eq!(spec.executable, PathBuf::from("/tmp/tests/test_flac_decode"));
    }

    #[test]
    fn test_effective_timeout_fallback() {
        let default = Duration::from_secs(30);

        let spec = TestSpec::new("a", "/bin/true");
        assert_eq!(spec.effective_timeout(default), default);

        let spec = spec.with_timeout(Duration::ZERO);
        assert_eq!(spec.effective_timeout(default), default);

        let spec = TestSpec::new("b", "/bin/true").with_timeout(Duration::from_millis(200));
        assert_eq!(spec.effective_timeout(default), Duration::from_millis(200));
    }
}
