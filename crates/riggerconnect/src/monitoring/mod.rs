//! Crash reporting, analytics and performance tracing.
//!
//! Both wrappers forward to a [`TelemetrySink`]. The default sink emits
//! structured `tracing` events; tests use [`MemorySink`].

mod crash;
mod performance;
mod sink;

pub use crash::{CrashReporter, RiggerEventType};
pub use performance::{
    traces, PerformanceMonitor, PerformanceReport, RiggerOperationType, MAX_ACTIVE_TRACES,
};
pub use sink::{EventParams, EventValue, MemorySink, Recorded, TelemetrySink, TraceRecord, TracingSink};
