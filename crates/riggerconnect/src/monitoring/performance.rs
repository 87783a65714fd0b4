//! Performance traces and custom metrics.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::sink::{TelemetrySink, TraceRecord};
use crate::config::MonitoringConfig;

/// Well-known trace names.
pub mod traces {
    /// Application startup.
    pub const APP_START: &str = "app_start";
    /// Sign-in flow.
    pub const USER_LOGIN: &str = "user_login";
    /// Job search.
    pub const JOB_SEARCH: &str = "job_search";
    /// Profile load.
    pub const PROFILE_LOAD: &str = "profile_load";
    /// Certification upload.
    pub const CERTIFICATION_UPLOAD: &str = "certification_upload";
    /// Equipment listing.
    pub const EQUIPMENT_LISTING: &str = "equipment_listing";
    /// Safety report submission.
    pub const SAFETY_REPORT: &str = "safety_report";
    /// Outbound HTTP request.
    pub const NETWORK_REQUEST: &str = "network_request";
    /// Local database work.
    pub const DATABASE_OPERATION: &str = "database_operation";
    /// Image processing.
    pub const IMAGE_PROCESSING: &str = "image_processing";
}

/// Rigger operations worth timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum RiggerOperationType {
    JobSearch,
    JobApplicationSubmit,
    ProfileUpdate,
    CertificationUpload,
    EquipmentAdd,
    SafetyReportSubmit,
    TrainingModuleComplete,
    PaymentProcess,
    LocationUpdate,
    NetworkSync,
    DataBackup,
    ImageUpload,
}

impl RiggerOperationType {
    /// Snake-case name used in trace names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobSearch => "job_search",
            Self::JobApplicationSubmit => "job_application_submit",
            Self::ProfileUpdate => "profile_update",
            Self::CertificationUpload => "certification_upload",
            Self::EquipmentAdd => "equipment_add",
            Self::SafetyReportSubmit => "safety_report_submit",
            Self::TrainingModuleComplete => "training_module_complete",
            Self::PaymentProcess => "payment_process",
            Self::LocationUpdate => "location_update",
            Self::NetworkSync => "network_sync",
            Self::DataBackup => "data_backup",
            Self::ImageUpload => "image_upload",
        }
    }
}

impl fmt::Display for RiggerOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct ActiveTrace {
    name: String,
    started: Instant,
    attributes: BTreeMap<String, String>,
    metrics: BTreeMap<String, i64>,
}

/// Snapshot of the monitor for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceReport {
    /// Traces started but not yet stopped.
    pub active_traces: usize,
    /// Traces completed since startup, including recorded metrics.
    pub completed_traces: u64,
    /// Traces evicted unstopped because too many were active.
    pub abandoned_traces: u64,
    /// Whether traces are forwarded to the sink.
    pub monitoring_enabled: bool,
    /// When the report was taken.
    pub timestamp: DateTime<Utc>,
    /// CPU architecture.
    pub device_model: String,
    /// Operating system.
    pub os_version: String,
}

/// Starts and stops named traces and forwards them to the sink.
///
/// Trace ids are `<name>_<millis>_<seq>`; unknown ids are ignored on stop.
/// At most [`MAX_ACTIVE_TRACES`] traces are held open; starting another evicts
/// the oldest.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    sink: Arc<dyn TelemetrySink>,
    enabled: bool,
    max_active: usize,
    initialized: Arc<AtomicBool>,
    active: Arc<Mutex<HashMap<String, ActiveTrace>>>,
    seq: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    abandoned: Arc<AtomicU64>,
}

/// Upper bound on traces started but not yet stopped.
pub const MAX_ACTIVE_TRACES: usize = 1024;

impl PerformanceMonitor {
    /// Create a monitor over `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn TelemetrySink>, config: &MonitoringConfig) -> Self {
        Self {
            sink,
            enabled: config.performance_enabled,
            max_active: MAX_ACTIVE_TRACES,
            initialized: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            abandoned: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enable collection. Repeated calls are no-ops.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(enabled = self.enabled, "Performance monitoring initialized");
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Start a trace and return its id.
    pub fn start_trace(&self, name: &str) -> String {
        self.start_with(name, BTreeMap::new(), BTreeMap::new())
    }

    fn start_with(
        &self,
        name: &str,
        attributes: BTreeMap<String, String>,
        metrics: BTreeMap<String, i64>,
    ) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{name}_{}_{seq}", Utc::now().timestamp_millis());

        match self.active.lock() {
            Ok(mut active) => {
                if active.len() >= self.max_active {
                    let oldest = active
                        .iter()
                        .min_by_key(|(_, t)| t.started)
                        .map(|(id, _)| id.clone());
                    if let Some(oldest) = oldest {
                        active.remove(&oldest);
                        self.abandoned.fetch_add(1, Ordering::Relaxed);
                        warn!(id = %oldest, "Too many active traces, dropping oldest");
                    }
                }
                active.insert(
                    id.clone(),
                    ActiveTrace {
                        name: name.to_string(),
                        started: Instant::now(),
                        attributes,
                        metrics,
                    },
                );
                trace!(%id, "Started trace");
            }
            Err(e) => warn!("Trace registry poisoned: {e}"),
        }
        id
    }

    /// Stop a trace, merge `attributes` and add a `duration_ms` metric.
    ///
    /// Returns the duration, or `None` if the id was not active.
    pub fn stop_trace(&self, id: &str, attributes: BTreeMap<String, String>) -> Option<i64> {
        let mut active = self.active.lock().ok()?.remove(id)?;
        let duration_ms = i64::try_from(active.started.elapsed().as_millis()).unwrap_or(i64::MAX);

        active.attributes.extend(attributes);
        active.metrics.insert("duration_ms".to_string(), duration_ms);
        self.finish(TraceRecord {
            name: active.name,
            attributes: active.attributes,
            metrics: active.metrics,
        });
        trace!(%id, duration_ms, "Stopped trace");
        Some(duration_ms)
    }

    /// Start a `network_request` trace describing an HTTP call.
    ///
    /// Stop it with [`stop_trace`](Self::stop_trace) once the response is in.
    pub fn monitor_network_request(
        &self,
        url: &str,
        method: &str,
        request_bytes: Option<i64>,
        response_bytes: Option<i64>,
        response_code: Option<u16>,
    ) -> String {
        let attributes = BTreeMap::from([
            ("http_url".to_string(), url.to_string()),
            ("http_method".to_string(), method.to_string()),
        ]);
        let metrics = [
            ("request_payload_bytes", request_bytes),
            ("response_payload_bytes", response_bytes),
            ("http_response_code", response_code.map(i64::from)),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect();

        self.start_with(traces::NETWORK_REQUEST, attributes, metrics)
    }

    /// Start a `rigger_<op>` trace tagged with the operation type.
    pub fn monitor_rigger_operation(
        &self,
        operation: RiggerOperationType,
        attributes: BTreeMap<String, String>,
    ) -> String {
        let mut all = BTreeMap::from([
            ("operation_type".to_string(), operation.to_string()),
            ("feature_category".to_string(), "rigger_operations".to_string()),
        ]);
        all.extend(attributes);
        self.start_with(&format!("rigger_{operation}"), all, BTreeMap::new())
    }

    /// Record a one-off metric as a trace of the same name.
    pub fn record_metric(&self, name: &str, value: i64, attributes: BTreeMap<String, String>) {
        self.finish(TraceRecord {
            name: name.to_string(),
            attributes,
            metrics: BTreeMap::from([(name.to_string(), value)]),
        });
        debug!(name, value, "Recorded metric");
    }

    fn finish(&self, record: TraceRecord) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.sink.trace(&record);
        }
    }

    /// Snapshot of the monitor state.
    #[must_use]
    pub fn report(&self) -> PerformanceReport {
        PerformanceReport {
            active_traces: self.active.lock().map(|a| a.len()).unwrap_or(0),
            completed_traces: self.completed.load(Ordering::Relaxed),
            abandoned_traces: self.abandoned.load(Ordering::Relaxed),
            monitoring_enabled: self.enabled,
            timestamp: Utc::now(),
            device_model: std::env::consts::ARCH.to_string(),
            os_version: std::env::consts::OS.to_string(),
        }
    }
}
