//! `riggerconnect` - feedback routing and audit-logged roll history for RiggerConnect
//!
//! This library routes user and rigger feedback to the right mailbox, keeps a
//! local `SQLite` history of equipment and material movements with an
//! automatic activity log, and wraps crash reporting and performance tracing.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod feedback;
pub mod logging;
pub mod monitoring;
pub mod records;
pub mod repository;
pub mod services;
pub mod storage;
pub mod system;

pub use config::Config;
pub use error::{Error, Result};
pub use feedback::{FeedbackCategory, FeedbackManager, FeedbackRequest, RiggerFeedbackType};
pub use logging::init_logging;
pub use monitoring::{CrashReporter, PerformanceMonitor};
pub use records::{ActivityLogEntry, ActivityType, RollHistoryEntry};
pub use repository::{DataRepository, PurgeStats};
pub use services::Services;
pub use storage::{Database, StorageStats};
