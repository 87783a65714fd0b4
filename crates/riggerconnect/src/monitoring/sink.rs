//! Telemetry sinks.
//!
//! A [`TelemetrySink`] is the external analytics / crash-reporting service.
//! The crate ships a sink that writes structured `tracing` events and one that
//! keeps everything in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

/// A typed event or attribute value.
///
/// Mirrors the value types an analytics backend stores natively.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventValue {
    /// Text value.
    Str(String),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// Floating point.
    Double(f64),
    /// Boolean flag.
    Bool(bool),
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => f.write_str(v),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for EventValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<i32> for EventValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<usize> for EventValue {
    fn from(v: usize) -> Self {
        Self::Long(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for EventValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Named, typed event parameters in a stable order.
pub type EventParams = BTreeMap<String, EventValue>;

/// A completed performance trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    /// Trace name, e.g. `database_operation`.
    pub name: String,
    /// String attributes.
    pub attributes: BTreeMap<String, String>,
    /// Integer metrics, always including `duration_ms` for timed traces.
    pub metrics: BTreeMap<String, i64>,
}

/// The external telemetry collaborator.
///
/// Implementations must not panic; a failing backend drops data.
pub trait TelemetrySink: Send + Sync + fmt::Debug {
    /// Record an analytics event.
    fn event(&self, name: &str, params: &EventParams);

    /// Record a non-fatal exception.
    fn exception(&self, message: &str, context: Option<&str>);

    /// Attach a key to every subsequent crash report.
    fn custom_key(&self, key: &str, value: &str);

    /// Identify the current user.
    fn user_id(&self, user_id: &str);

    /// Set a user property.
    fn user_property(&self, key: &str, value: &str);

    /// Record a finished trace.
    fn trace(&self, record: &TraceRecord);
}

/// Forwards telemetry as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn event(&self, name: &str, params: &EventParams) {
        let params = serde_json::to_string(params).unwrap_or_default();
        info!(target: "riggerconnect::analytics", event = name, %params, "analytics event");
    }

    fn exception(&self, message: &str, context: Option<&str>) {
        warn!(
            target: "riggerconnect::crash",
            context = context.unwrap_or_default(),
            "non-fatal exception: {message}"
        );
    }

    fn custom_key(&self, key: &str, value: &str) {
        info!(target: "riggerconnect::crash", key, value, "custom key");
    }

    fn user_id(&self, user_id: &str) {
        info!(target: "riggerconnect::crash", user_id, "user id set");
    }

    fn user_property(&self, key: &str, value: &str) {
        info!(target: "riggerconnect::analytics", key, value, "user property");
    }

    fn trace(&self, record: &TraceRecord) {
        let duration_ms = record.metrics.get("duration_ms").copied();
        info!(
            target: "riggerconnect::performance",
            trace = %record.name,
            duration_ms,
            attributes = ?record.attributes,
            metrics = ?record.metrics,
            "trace completed"
        );
    }
}

/// Everything a [`MemorySink`] has received.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recorded {
    /// Analytics events in arrival order.
    pub events: Vec<(String, EventParams)>,
    /// Non-fatal exceptions (message, context).
    pub exceptions: Vec<(String, Option<String>)>,
    /// Crash report custom keys.
    pub custom_keys: BTreeMap<String, String>,
    /// Last user id set.
    pub user_id: Option<String>,
    /// User properties.
    pub user_properties: BTreeMap<String, String>,
    /// Completed traces.
    pub traces: Vec<TraceRecord>,
}

/// Keeps all telemetry in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    recorded: Mutex<Recorded>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Recorded {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Events with the given name, in arrival order.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<EventParams> {
        self.snapshot()
            .events
            .into_iter()
            .filter(|(n, _)| n == name)
            .map(|(_, p)| p)
            .collect()
    }

    fn with(&self, f: impl FnOnce(&mut Recorded)) {
        if let Ok(mut recorded) = self.recorded.lock() {
            f(&mut recorded);
        }
    }
}

impl TelemetrySink for MemorySink {
    fn event(&self, name: &str, params: &EventParams) {
        self.with(|r| r.events.push((name.to_string(), params.clone())));
    }

    fn exception(&self, message: &str, context: Option<&str>) {
        self.with(|r| {
            r.exceptions
                .push((message.to_string(), context.map(str::to_string)));
        });
    }

    fn custom_key(&self, key: &str, value: &str) {
        self.with(|r| {
            r.custom_keys.insert(key.to_string(), value.to_string());
        });
    }

    fn user_id(&self, user_id: &str) {
        self.with(|r| r.user_id = Some(user_id.to_string()));
    }

    fn user_property(&self, key: &str, value: &str) {
        self.with(|r| {
            r.user_properties.insert(key.to_string(), value.to_string());
        });
    }

    fn trace(&self, record: &TraceRecord) {
        self.with(|r| r.traces.push(record.clone()));
    }
}
