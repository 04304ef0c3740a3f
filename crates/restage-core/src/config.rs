//! Journal and application configuration.

use std::fs;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the per-user application directory.
pub const APP_DIR_NAME: &str = "restage";

/// Default number of days a session journal is kept.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Configuration for the operation journal.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct JournalConfig {
    /// Directory holding one JSON file per session.
    #[builder(default = "default_log_dir()")]
    #[serde(default = "default_log_dir", rename = "dir")]
    pub log_dir: PathBuf,

    /// Remove old session files when the journal is opened.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub retention_enabled: bool,

    /// Age in days after which a session file is removed.
    #[builder(default = "DEFAULT_RETENTION_DAYS")]
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

/// Per-user configuration directory for restage.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Per-user directory where session journals are written.
pub fn default_log_dir() -> PathBuf {
    default_config_dir().join("logs")
}

impl JournalConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref dir) = self.log_dir {
            if dir.as_os_str().is_empty() {
                return Err("Log directory cannot be empty".to_string());
            }
        }
        if self.retention_enabled != Some(false) && self.retention_days == Some(0) {
            return Err("Retention days must be at least 1".to_string());
        }
        Ok(())
    }
}

impl JournalConfig {
    /// Create a new journal config builder.
    pub fn builder() -> JournalConfigBuilder {
        JournalConfigBuilder::default()
    }

    /// Journal in `log_dir` with default retention.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            retention_enabled: true,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    /// Disable retention pruning.
    pub fn without_retention(mut self) -> Self {
        self.retention_enabled = false;
        self
    }

    /// Set the retention period in days.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self::new(default_log_dir())
    }
}

/// Top-level settings file (`config.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub journal: JournalConfig,
}

impl Config {
    /// Default settings file location.
    pub fn default_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.check()?;
        Ok(config)
    }

    /// Load settings from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load settings from `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.journal.retention_enabled && self.journal.retention_days == 0 {
            return Err(ConfigError::Invalid {
                message: "journal.retention_days must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = JournalConfig::builder()
            .log_dir("/tmp/logs")
            .retention_days(7u32)
            .build()
            .unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.retention_days, 7);
        assert!(config.retention_enabled);
    }

    #[test]
    fn test_builder_rejects_zero_days() {
        let result = JournalConfig::builder()
            .log_dir("/tmp/logs")
            .retention_days(0u32)
            .build();
        assert!(result.is_err());

        let config = JournalConfig::builder()
            .log_dir("/tmp/logs")
            .retention_enabled(false)
            .retention_days(0u32)
            .build()
            .unwrap();
        assert!(!config.retention_enabled);
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            [journal]
            dir = "/var/log/restage"
            retention_days = 14
        "#;
        let config = Config::from_toml(text, Path::new("config.toml")).unwrap();
        assert_eq!(config.journal.log_dir, PathBuf::from("/var/log/restage"));
        assert_eq!(config.journal.retention_days, 14);
        assert!(config.journal.retention_enabled);
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = Config::from_toml("", Path::new("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_invalid() {
        let text = "[journal]\nretention_days = 0\n";
        assert!(matches!(
            Config::from_toml(text, Path::new("c.toml")),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
