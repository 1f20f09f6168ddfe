//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::AppConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./exec-harness.yaml",
    "./exec-harness.yml",
    "./.exec-harness.yaml",
    "~/.config/exec-harness/config.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Find a configuration file in the standard locations
    pub fn find() -> Option<PathBuf> {
        for location in CONFIG_LOCATIONS {
            let path = expand_path(location);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Load configuration from the default location, or defaults when none exists
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::find() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Example configuration used by `config init`
    pub fn example() -> Self {
        let mut config = Self::default();
        config.app.timeout_ms = 30_000;
        config.app.parallel = true;
        config.app.max_parallel = 4;
        config
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.app.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be positive");
        }
        if self.app.max_parallel == 0 {
            anyhow::bail!("max_parallel must be at least 1");
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory
fn expand_path(location: &str) -> PathBuf {
    if let Some(rest) = location.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(location)
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("exec-harness.yaml");

        let mut config = ConfigFile::default();
        config.app.timeout_ms = 5_000;
        config.app.parallel = true;
        config.save(&path).expect("save config");

        let loaded = ConfigFile::load(&path).expect("load config");
        assert_eq!(loaded.app.timeout_ms, 5_000);
        assert!(loaded.app.parallel);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "app:\n  timeout_ms: 0\n").expect("write config");

        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn test_expand_path_home() {
        std::env::var("HOME").expect("HOME set in test environment");
        let expanded = expand_path("~/.config/exec-harness/config.yaml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
