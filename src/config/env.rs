//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::str::FromStr;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "EXEC_HARNESS";

/// Configuration overrides read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Timeout from EXEC_HARNESS_TIMEOUT_MS
    pub timeout_ms: Option<u64>,
    /// Parallel from EXEC_HARNESS_PARALLEL
    pub parallel: Option<bool>,
    /// Worker cap from EXEC_HARNESS_MAX_PARALLEL
    pub max_parallel: Option<usize>,
    /// Capture from EXEC_HARNESS_CAPTURE
    pub capture_output: Option<bool>,
    /// Output format from EXEC_HARNESS_FORMAT
    pub format: Option<String>,
}

impl EnvConfig {
    /// Load overrides from environment variables
    pub fn load() -> Self {
        Self {
            timeout_ms: get_env_parse("TIMEOUT_MS"),
            parallel: get_env_bool("PARALLEL"),
            max_parallel: get_env_parse("MAX_PARALLEL"),
            capture_output: get_env_bool("CAPTURE"),
            format: get_env("FORMAT"),
        }
    }

    /// Check if any environment overrides are set
    pub fn has_any(&self) -> bool {
        self.timeout_ms.is_some()
            || self.parallel.is_some()
            || self.max_parallel.is_some()
            || self.capture_output.is_some()
            || self.format.is_some()
    }

    /// Overlay these overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(max_parallel) = self.max_parallel {
            config.max_parallel = max_parallel;
        }
        if let Some(capture) = self.capture_output {
            config.capture_output = capture;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get and parse environment variable with prefix
fn get_env_parse<T: FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|value| value.parse().ok())
}

/// Get boolean environment variable with prefix
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            timeout_ms: Some(1_000),
            parallel: Some(true),
            max_parallel: None,
            capture_output: Some(false),
            format: Some("json".to_string()),
        };

        env.apply(&mut config);

        assert_eq!(config.timeout_ms, 1_000);
        assert!(config.parallel);
        assert_eq!(config.max_parallel, 4);
        assert!(!config.capture_output);
        assert_eq!(config.format, "json");
    }

    #[test]
    fn test_has_any() {
        assert!(!EnvConfig::default().has_any());

        let env = EnvConfig {
            parallel: Some(false),
            ..EnvConfig::default()
        };
        assert!(env.has_any());
    }
}
