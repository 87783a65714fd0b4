//! Host and user context attached to feedback and crash reports.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

/// Device and application details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// CPU architecture, e.g. `aarch64`.
    pub device_model: String,
    /// Operating system family, e.g. `unix`.
    pub device_manufacturer: String,
    /// Operating system, e.g. `linux`.
    pub os_version: String,
    /// Application version.
    pub app_version: String,
}

impl SystemInfo {
    /// Describe the current host.
    #[must_use]
    pub fn collect(app_version: &str) -> Self {
        Self {
            device_model: std::env::consts::ARCH.to_string(),
            device_manufacturer: std::env::consts::FAMILY.to_string(),
            os_version: std::env::consts::OS.to_string(),
            app_version: app_version.to_string(),
        }
    }
}

/// Locale and clock details of the submitting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Locale from `LC_ALL` / `LANG`, or `und` when unset.
    pub locale: String,
    /// Local UTC offset, e.g. `+08:00`.
    pub timezone: String,
}

impl UserContext {
    /// Capture the current user context.
    #[must_use]
    pub fn collect() -> Self {
        let locale = ["LC_ALL", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| "und".to_string());

        Self {
            timestamp: Utc::now().timestamp_millis(),
            locale,
            timezone: Local::now().offset().to_string(),
        }
    }
}
