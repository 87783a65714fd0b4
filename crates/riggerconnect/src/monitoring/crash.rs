//! Crash reporting and analytics forwarding.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sink::{EventParams, EventValue, TelemetrySink};
use crate::config::MonitoringConfig;
use crate::system::SystemInfo;

/// Business events worth tracking for riggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiggerEventType {
    /// Searched for jobs.
    JobSearch,
    /// Applied for a job.
    JobApplication,
    /// Updated the profile.
    ProfileUpdate,
    /// Uploaded a certification.
    CertificationUpload,
    /// Listed equipment.
    EquipmentListing,
    /// Filed a safety report.
    SafetyReport,
    /// Completed training.
    TrainingCompletion,
    /// Connected with another user.
    NetworkConnection,
    /// A payment went through.
    PaymentProcessed,
    /// Shared a location update.
    LocationUpdate,
}

impl RiggerEventType {
    /// Snake-case name used in event names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobSearch => "job_search",
            Self::JobApplication => "job_application",
            Self::ProfileUpdate => "profile_update",
            Self::CertificationUpload => "certification_upload",
            Self::EquipmentListing => "equipment_listing",
            Self::SafetyReport => "safety_report",
            Self::TrainingCompletion => "training_completion",
            Self::NetworkConnection => "network_connection",
            Self::PaymentProcessed => "payment_processed",
            Self::LocationUpdate => "location_update",
        }
    }
}

impl fmt::Display for RiggerEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forwards events, user identity and non-fatal exceptions to the sink.
///
/// Built once at startup and shared. Disabled halves drop their calls.
#[derive(Debug, Clone)]
pub struct CrashReporter {
    sink: Arc<dyn TelemetrySink>,
    analytics_enabled: bool,
    crash_reporting_enabled: bool,
    initialized: Arc<OnceLock<SystemInfo>>,
}

impl CrashReporter {
    /// Create a reporter over `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn TelemetrySink>, config: &MonitoringConfig) -> Self {
        Self {
            sink,
            analytics_enabled: config.analytics_enabled,
            crash_reporting_enabled: config.crash_reporting_enabled,
            initialized: Arc::new(OnceLock::new()),
        }
    }

    /// Register device details with the crash backend.
    ///
    /// Only the first call has any effect.
    pub fn initialize(&self, app_version: &str) {
        let mut first = false;
        let info = self.initialized.get_or_init(|| {
            first = true;
            SystemInfo::collect(app_version)
        });
        if !first {
            return;
        }
        if self.crash_reporting_enabled {
            self.sink.custom_key("app_version", &info.app_version);
            self.sink.custom_key("device_model", &info.device_model);
            self.sink.custom_key("os_version", &info.os_version);
        }
        debug!("Crash reporting initialized");
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Record a non-fatal error.
    pub fn log_exception(&self, error: &dyn std::error::Error, context: Option<&str>) {
        debug!(context, "Non-fatal exception logged: {error}");
        if self.crash_reporting_enabled {
            self.sink.exception(&error.to_string(), context);
        }
    }

    /// Identify the current user.
    pub fn set_user_id(&self, user_id: &str) {
        if self.crash_reporting_enabled {
            self.sink.user_id(user_id);
        }
    }

    /// Set a custom user property.
    pub fn set_user_property(&self, key: &str, value: &str) {
        if self.crash_reporting_enabled {
            self.sink.custom_key(key, value);
        }
        if self.analytics_enabled {
            self.sink.user_property(key, value);
        }
    }

    /// Record an analytics event.
    pub fn log_event<I, K, V>(&self, name: &str, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<EventValue>,
    {
        if !self.analytics_enabled {
            return;
        }
        let params: EventParams = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.sink.event(name, &params);
    }

    /// Record a rigger business event as `rigger_<type>`.
    pub fn log_rigger_event(&self, event_type: RiggerEventType, params: EventParams) {
        let mut all = EventParams::new();
        all.insert("event_category".to_string(), "rigger_operations".into());
        all.insert("event_type".to_string(), event_type.as_str().into());
        all.extend(params);
        self.log_event(&format!("rigger_{event_type}"), all);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::MemorySink;

    fn reporter(config: &MonitoringConfig) -> (CrashReporter, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (CrashReporter::new(sink.clone(), config), sink)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (reporter, sink) = reporter(&MonitoringConfig::default());
        assert!(!reporter.is_initialized());

        reporter.initialize("1.2.3");
        reporter.initialize("9.9.9");

        assert!(reporter.is_initialized());
        let recorded = sink.snapshot();
        assert_eq!(recorded.custom_keys["app_version"], "1.2.3");
        assert_eq!(recorded.custom_keys.len(), 3);
    }

    #[test]
    fn test_clones_share_initialization() {
        let (reporter, _sink) = reporter(&MonitoringConfig::default());
        let clone = reporter.clone();
        reporter.initialize("1.0.0");
        assert!(clone.is_initialized());
    }

    #[test]
    fn test_log_event_dispatches_types() {
        let (reporter, sink) = reporter(&MonitoringConfig::default());
        reporter.log_event(
            "job_viewed",
            [
                ("job_id", EventValue::from("J-1")),
                ("rate", EventValue::from(55.5)),
                ("urgent", EventValue::from(true)),
            ],
        );

        let events = sink.events_named("job_viewed");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["rate"], EventValue::Double(55.5));
        assert_eq!(events[0]["urgent"], EventValue::Bool(true));
    }

    #[test]
    fn test_log_rigger_event() {
        let (reporter, sink) = reporter(&MonitoringConfig::default());
        let mut params = EventParams::new();
        params.insert("site".to_string(), "Pier 4".into());

        reporter.log_rigger_event(RiggerEventType::SafetyReport, params);

        let events = sink.events_named("rigger_safety_report");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event_category"], EventValue::from("rigger_operations"));
        assert_eq!(events[0]["event_type"], EventValue::from("safety_report"));
        assert_eq!(events[0]["site"], EventValue::from("Pier 4"));
    }

    #[test]
    fn test_log_exception() {
        let (reporter, sink) = reporter(&MonitoringConfig::default());
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");

        reporter.log_exception(&err, Some("Feedback submission failed"));

        let recorded = sink.snapshot();
        assert_eq!(recorded.exceptions.len(), 1);
        assert!(recorded.exceptions[0].0.contains("disk full"));
    }

    #[test]
    fn test_disabled_reporter_drops_calls() {
        let config = MonitoringConfig {
            analytics_enabled: false,
            crash_reporting_enabled: false,
            performance_enabled: true,
        };
        let (reporter, sink) = reporter(&config);

        reporter.initialize("1.0.0");
        reporter.log_event("x", [("k", 1_i32)]);
        reporter.set_user_id("u");
        reporter.set_user_property("k", "v");
        reporter.log_exception(&std::fmt::Error, None);

        assert_eq!(sink.snapshot(), crate::monitoring::Recorded::default());
    }

    #[test]
    fn test_set_user_identity() {
        let (reporter, sink) = reporter(&MonitoringConfig::default());
        reporter.set_user_id("rigger-9");
        reporter.set_user_property("licence_class", "HR");

        let recorded = sink.snapshot();
        assert_eq!(recorded.user_id.as_deref(), Some("rigger-9"));
        assert_eq!(recorded.user_properties["licence_class"], "HR");
        assert_eq!(recorded.custom_keys["licence_class"], "HR");
    }

    #[test]
    fn test_rigger_event_type_names() {
        assert_eq!(RiggerEventType::JobSearch.to_string(), "job_search");
        assert_eq!(
            RiggerEventType::PaymentProcessed.to_string(),
            "payment_processed"
        );
    }
}
