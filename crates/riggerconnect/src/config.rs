//! Configuration management for riggerconnect.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "riggerconnect";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "rigger.db";

/// Default outbox directory name.
const OUTBOX_DIR_NAME: &str = "outbox";

/// Pattern accepted for configured and user-supplied email addresses.
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `RIGGERCONNECT_`, sections split by `__`)
/// 2. TOML config file at `~/.config/riggerconnect/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Feedback routing configuration.
    pub feedback: FeedbackConfig,
    /// Monitoring configuration.
    pub monitoring: MonitoringConfig,
    /// Application metadata.
    pub app: AppConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/riggerconnect/rigger.db`
    pub database_path: Option<PathBuf>,
    /// Rows older than this many days are purged by `rigger purge` when no cutoff is given.
    /// Set to 0 for unlimited.
    pub retention_days: u32,
}

/// Feedback routing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// General support inbox.
    pub support_email: String,
    /// Business and partnership inbox.
    pub business_email: String,
    /// Technical / development inbox.
    pub technical_email: String,
    /// Directory that outgoing messages are spooled into.
    /// Defaults to `~/.local/share/riggerconnect/outbox`
    pub outbox_dir: Option<PathBuf>,
    /// Attach device and app details to feedback by default.
    pub include_system_info: bool,
}

/// Monitoring-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Forward analytics events.
    pub analytics_enabled: bool,
    /// Forward non-fatal exceptions and user properties.
    pub crash_reporting_enabled: bool,
    /// Collect performance traces.
    pub performance_enabled: bool,
}

/// Application metadata attached to feedback and crash reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reported application version.
    pub version: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_days: 365,
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            support_email: "support@riggerconnect.com".to_string(),
            business_email: "business@riggerconnect.com".to_string(),
            technical_email: "dev@riggerconnect.com".to_string(),
            outbox_dir: None,
            include_system_info: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            analytics_enabled: true,
            crash_reporting_enabled: true,
            performance_enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Check whether `address` looks like an email address.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(address))
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("RIGGERCONNECT_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let addresses = [
            ("support_email", &self.feedback.support_email),
            ("business_email", &self.feedback.business_email),
            ("technical_email", &self.feedback.technical_email),
        ];
        for (key, address) in addresses {
            if !is_valid_email(address) {
                return Err(Error::ConfigValidation {
                    message: format!("{key} is not a valid email address: {address:?}"),
                });
            }
        }

        if let Some(outbox) = &self.feedback.outbox_dir {
            if outbox.as_os_str().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "outbox_dir must not be empty".to_string(),
                });
            }
        }

        if self.app.version.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "app.version must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the outbox directory, resolving defaults if not set.
    #[must_use]
    pub fn outbox_dir(&self) -> PathBuf {
        self.feedback
            .outbox_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(OUTBOX_DIR_NAME))
    }

    /// Get the retention period, or `None` when rows are kept forever.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        if self.storage.retention_days == 0 {
            None
        } else {
            Some(Duration::days(i64::from(self.storage.retention_days)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.retention_days, 365);
        assert!(config.feedback.include_system_info);
        assert!(config.monitoring.analytics_enabled);
        assert!(config.monitoring.crash_reporting_enabled);
        assert!(config.monitoring.performance_enabled);
        assert_eq!(config.app.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_default_feedback_addresses_are_distinct() {
        let feedback = FeedbackConfig::default();
        assert_ne!(feedback.support_email, feedback.business_email);
        assert_ne!(feedback.business_email, feedback.technical_email);
        assert_ne!(feedback.support_email, feedback.technical_email);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_address() {
        let mut config = Config::default();
        config.feedback.business_email = "not-an-address".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("business_email"));
    }

    #[test]
    fn test_validate_empty_outbox() {
        let mut config = Config::default();
        config.feedback.outbox_dir = Some(PathBuf::new());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("outbox_dir"));
    }

    #[test]
    fn test_validate_empty_version() {
        let mut config = Config::default();
        config.app.version = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("crew@site.example"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("crew@site"));
        assert!(!is_valid_email("two words@site.example"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("rigger.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_outbox_dir_default() {
        let path = Config::default().outbox_dir();
        assert!(path.ends_with("riggerconnect/outbox"));
    }

    #[test]
    fn test_retention_none_when_zero() {
        let mut config = Config::default();
        config.storage.retention_days = 0;
        assert!(config.retention().is_none());
    }

    #[test]
    fn test_retention_some_when_set() {
        let config = Config::default();
        assert_eq!(config.retention(), Some(Duration::days(365)));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("riggerconnect"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [storage]
            retention_days = 30

            [feedback]
            support_email = "help@crane.example"
            include_system_info = false
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.storage.retention_days, 30);
        assert_eq!(config.feedback.support_email, "help@crane.example");
        assert!(!config.feedback.include_system_info);
        assert_eq!(
            config.feedback.business_email,
            FeedbackConfig::default().business_email
        );
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[feedback]\ntechnical_email = \"nobody\"\n").unwrap();

        assert!(Config::load_from(Some(path)).is_err());
    }

    #[test]
    fn test_feedback_config_deserialize_partial() {
        let json = r#"{"support_email": "a@b.example"}"#;
        let feedback: FeedbackConfig = serde_json::from_str(json).unwrap();
        assert_eq!(feedback.support_email, "a@b.example");
        assert!(feedback.include_system_info);
    }
}
