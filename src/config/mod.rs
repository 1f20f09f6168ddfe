//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::EnvConfig;
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::ExecutorConfig;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default per-test timeout in milliseconds
    pub timeout_ms: u64,

    /// Run tests in parallel by default
    pub parallel: bool,

    /// Maximum concurrent shard workers
    pub max_parallel: usize,

    /// Capture test stdout/stderr
    pub capture_output: bool,

    /// Output format (text, json)
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            parallel: false,
            max_parallel: 4,
            capture_output: true,
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Engine settings derived from this configuration
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            global_timeout: Duration::from_millis(self.timeout_ms),
            parallel_enabled: self.parallel,
            max_parallel: self.max_parallel.max(1),
            capture_output: self.capture_output,
            ..ExecutorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_parallel, 4);
        assert!(config.capture_output);
        assert!(!config.parallel);
    }

    #[test]
    fn test_executor_config_mapping() {
        let mut config = AppConfig::default();
        config.timeout_ms = 500;
        config.max_parallel = 0;

        let engine = config.executor_config();
        assert_eq!(engine.global_timeout, Duration::from_millis(500));
        // Worker cap never drops below one
        assert_eq!(engine.max_parallel, 1);
    }
}
