//! Process-wide service graph.

use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::feedback::{FeedbackManager, MailClient, OutboxMailClient};
use crate::monitoring::{CrashReporter, PerformanceMonitor, TelemetrySink, TracingSink};
use crate::repository::DataRepository;
use crate::storage::Database;

/// Every long-lived service, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Services {
    /// Crash reporting and analytics.
    pub crash: CrashReporter,
    /// Performance traces.
    pub performance: PerformanceMonitor,
    /// Feedback routing.
    pub feedback: FeedbackManager,
    /// Roll history and activity log.
    pub repository: DataRepository,
    /// Outbox the feedback manager delivers to.
    pub outbox: Arc<OutboxMailClient>,
}

impl Services {
    /// Open the database and wire up the services with a `tracing` sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn init(config: &Config) -> Result<Self> {
        let db = Database::open(config.database_path())?;
        Ok(Self::with_parts(config, db, Arc::new(TracingSink)))
    }

    /// Wire up the services over an already-open database and a given sink.
    #[must_use]
    pub fn with_parts(config: &Config, db: Database, sink: Arc<dyn TelemetrySink>) -> Self {
        let crash = CrashReporter::new(Arc::clone(&sink), &config.monitoring);
        crash.initialize(&config.app.version);

        let performance = PerformanceMonitor::new(sink, &config.monitoring);
        performance.initialize();

        let outbox = Arc::new(OutboxMailClient::new(config.outbox_dir()));
        let mail: Arc<dyn MailClient> = outbox.clone();
        let feedback = FeedbackManager::new(
            &config.feedback,
            config.app.version.clone(),
            mail,
            crash.clone(),
        );

        let repository = DataRepository::new(db, config.retention());
        debug!(db = %config.database_path().display(), "Services initialized");

        Self {
            crash,
            performance,
            feedback,
            repository,
            outbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::feedback::{FeedbackCategory, FeedbackRequest};
    use crate::monitoring::MemorySink;
    use crate::records::RollHistoryEntry;

    fn test_config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.database_path = Some(temp.path().join("rigger.db"));
        config.feedback.outbox_dir = Some(temp.path().join("outbox"));
        config
    }

    #[test]
    fn test_init_opens_database() {
        let temp = TempDir::new().unwrap();
        let services = Services::init(&test_config(&temp)).unwrap();
        assert!(temp.path().join("rigger.db").exists());
        assert!(services.crash.is_initialized());
        assert!(services.performance.is_initialized());
    }

    #[test]
    fn test_init_reports_database_errors() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.storage.database_path = Some(temp.path().to_path_buf());

        let err = Services::init(&config).unwrap_err();
        assert!(err.is_database_error());
    }

    #[tokio::test]
    async fn test_wired_services_work_together() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let sink = Arc::new(MemorySink::new());
        let services =
            Services::with_parts(&config, Database::open_in_memory().unwrap(), sink.clone());

        services
            .feedback
            .send_feedback(FeedbackRequest::new(FeedbackCategory::JobIssue, "Gate locked"))
            .await;
        services
            .repository
            .insert_roll_history(RollHistoryEntry::new("R-1", "u1", "Lift", "done"))
            .await
            .unwrap();

        assert_eq!(services.outbox.pending().await.unwrap().len(), 1);
        assert_eq!(sink.events_named("user_feedback_submitted").len(), 1);
        assert_eq!(
            sink.snapshot().custom_keys["app_version"],
            env!("CARGO_PKG_VERSION")
        );
    }

    #[tokio::test]
    async fn test_feedback_honors_configured_system_info() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp);
        config.feedback.include_system_info = false;
        let sink = Arc::new(MemorySink::new());
        let services =
            Services::with_parts(&config, Database::open_in_memory().unwrap(), sink.clone());

        services
            .feedback
            .send_feedback(FeedbackRequest::new(FeedbackCategory::JobIssue, "gate"))
            .await;

        let pending = services.outbox.pending().await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&pending[0].body).unwrap();
        assert!(body.get("system_info").is_none());

        let events = sink.events_named("user_feedback_submitted");
        assert_eq!(
            events[0]["include_system_info"],
            crate::monitoring::EventValue::Bool(false)
        );
    }
}
