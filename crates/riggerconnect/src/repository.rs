//! Async repository over roll history and the activity log.
//!
//! Every roll history mutation appends one audit entry. SQLite work runs on
//! the blocking pool behind a single connection mutex, and live feeds are
//! refreshed after each mutation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::records::{ActivityLogEntry, ActivityType, RollHistoryEntry, ROLL_HISTORY_ENTITY};
use crate::storage::{ActivityLogFilter, Database, RollHistoryFilter, StorageStats};

/// Re-runs a live query; returns `false` once nobody is listening.
type Refresh = Box<dyn FnMut(&Database) -> bool + Send>;

/// Rows removed by a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    /// Roll history rows deleted.
    pub roll_history: usize,
    /// Activity log rows deleted.
    pub activity_logs: usize,
}

impl PurgeStats {
    /// Rows deleted across both tables.
    #[must_use]
    pub fn total(&self) -> usize {
        self.roll_history + self.activity_logs
    }
}

/// Roll history and activity log access with automatic audit logging.
#[derive(Clone)]
pub struct DataRepository {
    db: Arc<Mutex<Database>>,
    feeds: Arc<Mutex<Vec<Refresh>>>,
    retention: Option<Duration>,
}

impl std::fmt::Debug for DataRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRepository")
            .field("retention", &self.retention)
            .field("feeds", &self.feeds.lock().map(|f| f.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl DataRepository {
    /// Wrap an open database. `retention` drives [`purge_expired`](Self::purge_expired).
    #[must_use]
    pub fn new(db: Database, retention: Option<Duration>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            feeds: Arc::new(Mutex::new(Vec::new())),
            retention,
        }
    }

    /// Configured retention period, if any.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        self.retention
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let db = db
                .lock()
                .map_err(|e| Error::internal(format!("database lock poisoned: {e}")))?;
            f(&db)
        })
        .await?
    }

    /// Run a mutation, then refresh live feeds while still holding the connection.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let feeds = Arc::clone(&self.feeds);
        tokio::task::spawn_blocking(move || {
            let db = db
                .lock()
                .map_err(|e| Error::internal(format!("database lock poisoned: {e}")))?;
            let result = f(&db);
            refresh_feeds(&db, &feeds);
            result
        })
        .await?
    }

    /// Insert an entry, log `ROLL_HISTORY_CREATED`, and return the new row id.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails. A failed audit append does not
    /// roll back the insert.
    pub async fn insert_roll_history(&self, entry: RollHistoryEntry) -> Result<i64> {
        self.write(move |db| {
            let id = db.insert_roll_history(&entry)?;
            append_audit(db, &entry, id, ActivityType::RollHistoryCreated)?;
            debug!(id, roll_id = %entry.roll_id, "Inserted roll history entry");
            Ok(id)
        })
        .await
    }

    /// Replace an entry by id and log `ROLL_HISTORY_UPDATED`.
    ///
    /// Returns `false`, without an audit entry, if no row has that id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingId`] if the entry has no id, or an error if
    /// either write fails.
    pub async fn update_roll_history(&self, entry: RollHistoryEntry) -> Result<bool> {
        let id = require_id(&entry)?;
        self.write(move |db| {
            if !db.update_roll_history(id, &entry)? {
                return Ok(false);
            }
            append_audit(db, &entry, id, ActivityType::RollHistoryUpdated)?;
            debug!(id, roll_id = %entry.roll_id, "Updated roll history entry");
            Ok(true)
        })
        .await
    }

    /// Delete an entry by id and log `ROLL_HISTORY_DELETED`.
    ///
    /// Returns `false`, without an audit entry, if no row has that id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingId`] if the entry has no id, or an error if
    /// either write fails.
    pub async fn delete_roll_history(&self, entry: RollHistoryEntry) -> Result<bool> {
        let id = require_id(&entry)?;
        self.write(move |db| {
            if !db.delete_roll_history(id)? {
                return Ok(false);
            }
            append_audit(db, &entry, id, ActivityType::RollHistoryDeleted)?;
            debug!(id, roll_id = %entry.roll_id, "Deleted roll history entry");
            Ok(true)
        })
        .await
    }

    /// Append an activity log entry directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn log_activity(&self, entry: ActivityLogEntry) -> Result<i64> {
        self.write(move |db| db.insert_activity_log(&entry)).await
    }

    /// Delete rows in both tables with `timestamp < cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if either delete fails.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeStats> {
        let stats = self
            .write(move |db| {
                Ok(PurgeStats {
                    roll_history: db.delete_roll_history_before(&cutoff)?,
                    activity_logs: db.delete_activity_logs_before(&cutoff)?,
                })
            })
            .await?;
        info!(
            %cutoff,
            roll_history = stats.roll_history,
            activity_logs = stats.activity_logs,
            "Purged old rows"
        );
        Ok(stats)
    }

    /// Purge rows older than the retention period, measured back from `now`.
    ///
    /// Does nothing when retention is unlimited.
    ///
    /// # Errors
    ///
    /// Returns an error if the purge fails.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeStats> {
        match self.retention {
            Some(retention) => self.purge_older_than(now - retention).await,
            None => Ok(PurgeStats::default()),
        }
    }

    /// Roll history rows matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn roll_history(
        &self,
        filter: RollHistoryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<RollHistoryEntry>> {
        self.read(move |db| db.query_roll_history(&filter, limit))
            .await
    }

    /// Most recent entry for a business roll id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn roll_history_by_roll_id(
        &self,
        roll_id: impl Into<String>,
    ) -> Result<Option<RollHistoryEntry>> {
        let roll_id = roll_id.into();
        self.read(move |db| db.roll_history_by_roll_id(&roll_id))
            .await
    }

    /// Roll history row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn roll_history_by_id(&self, id: i64) -> Result<Option<RollHistoryEntry>> {
        self.read(move |db| db.roll_history(id)).await
    }

    /// Activity log rows matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn activity_logs(
        &self,
        filter: ActivityLogFilter,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityLogEntry>> {
        self.read(move |db| db.query_activity_logs(&filter, limit))
            .await
    }

    /// Live roll history rows matching `filter`.
    ///
    /// The receiver holds the current rows and is updated after every
    /// mutation made through this repository that changes the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub async fn watch_roll_history(
        &self,
        filter: RollHistoryFilter,
    ) -> Result<watch::Receiver<Vec<RollHistoryEntry>>> {
        let feeds = Arc::clone(&self.feeds);
        self.read(move |db| {
            let (tx, rx) = watch::channel(db.query_roll_history(&filter, None)?);
            register(&feeds, move |db: &Database| {
                if tx.is_closed() {
                    return false;
                }
                match db.query_roll_history(&filter, None) {
                    Ok(rows) => publish(&tx, rows),
                    Err(e) => warn!("Failed to refresh roll history feed: {e}"),
                }
                true
            });
            Ok(rx)
        })
        .await
    }

    /// Live activity log rows matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial query fails.
    pub async fn watch_activity_logs(
        &self,
        filter: ActivityLogFilter,
    ) -> Result<watch::Receiver<Vec<ActivityLogEntry>>> {
        let feeds = Arc::clone(&self.feeds);
        self.read(move |db| {
            let (tx, rx) = watch::channel(db.query_activity_logs(&filter, None)?);
            register(&feeds, move |db: &Database| {
                if tx.is_closed() {
                    return false;
                }
                match db.query_activity_logs(&filter, None) {
                    Ok(rows) => publish(&tx, rows),
                    Err(e) => warn!("Failed to refresh activity log feed: {e}"),
                }
                true
            });
            Ok(rx)
        })
        .await
    }

    /// Number of live feeds still registered.
    #[must_use]
    pub fn live_feeds(&self) -> usize {
        self.feeds.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Row counts and database size.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn stats(&self) -> Result<StorageStats> {
        self.read(Database::stats).await
    }
}

fn require_id(entry: &RollHistoryEntry) -> Result<i64> {
    entry.id.ok_or_else(|| Error::MissingId {
        roll_id: entry.roll_id.clone(),
    })
}

fn append_audit(
    db: &Database,
    entry: &RollHistoryEntry,
    id: i64,
    activity_type: ActivityType,
) -> Result<()> {
    let description = match activity_type {
        ActivityType::RollHistoryCreated => "New roll history entry created",
        ActivityType::RollHistoryUpdated => "Roll history entry updated",
        _ => "Roll history entry deleted",
    };
    let audit = ActivityLogEntry::new(entry.user_id.clone(), activity_type, description)
        .related_to(entry.roll_id.clone(), ROLL_HISTORY_ENTITY)
        .with_metadata(serde_json::json!({ "roll_history_id": id }));

    db.insert_activity_log(&audit).map(|_| ()).map_err(|e| {
        error!(id, roll_id = %entry.roll_id, "Audit log append failed: {e}");
        e
    })
}

fn register(feeds: &Mutex<Vec<Refresh>>, refresh: impl FnMut(&Database) -> bool + Send + 'static) {
    match feeds.lock() {
        Ok(mut feeds) => feeds.push(Box::new(refresh)),
        Err(e) => warn!("Feed registry poisoned: {e}"),
    }
}

fn refresh_feeds(db: &Database, feeds: &Mutex<Vec<Refresh>>) {
    match feeds.lock() {
        Ok(mut feeds) => feeds.retain_mut(|refresh| refresh(db)),
        Err(e) => warn!("Feed registry poisoned: {e}"),
    }
}

fn publish<T: PartialEq>(tx: &watch::Sender<Vec<T>>, rows: Vec<T>) {
    tx.send_if_modified(|current| {
        if *current == rows {
            false
        } else {
            *current = rows;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn create_test_repo() -> DataRepository {
        crate::logging::init_test_logging();
        let db = Database::open_in_memory().expect("failed to create test database");
        DataRepository::new(db, Some(Duration::days(30)))
    }

    fn lift(roll_id: &str) -> RollHistoryEntry {
        RollHistoryEntry::new(roll_id, "rigger-1", "Lift steel beam", "completed")
            .with_equipment("CRANE-7")
            .with_weight(1250.5)
    }

    fn audits_for(entries: &[ActivityLogEntry], roll_id: &str) -> usize {
        entries
            .iter()
            .filter(|e| e.related_entity_id.as_deref() == Some(roll_id))
            .count()
    }

    #[tokio::test]
    async fn test_insert_appends_one_audit_entry() {
        let repo = create_test_repo();
        let id = repo.insert_roll_history(lift("R-1")).await.unwrap();

        let logs = repo.activity_logs(ActivityLogFilter::All, None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].activity_type, ActivityType::RollHistoryCreated);
        assert_eq!(logs[0].user_id, "rigger-1");
        assert_eq!(logs[0].related_entity_id.as_deref(), Some("R-1"));
        assert_eq!(logs[0].related_entity_type.as_deref(), Some(ROLL_HISTORY_ENTITY));
        assert_eq!(
            logs[0].metadata,
            Some(serde_json::json!({ "roll_history_id": id }))
        );
    }

    #[tokio::test]
    async fn test_every_mutation_appends_exactly_one_audit_entry() {
        let repo = create_test_repo();
        let id = repo.insert_roll_history(lift("R-2")).await.unwrap();

        let mut stored = repo.roll_history_by_id(id).await.unwrap().unwrap();
        stored.status = "inspected".to_string();
        assert!(repo.update_roll_history(stored.clone()).await.unwrap());
        assert!(repo.delete_roll_history(stored).await.unwrap());

        let logs = repo.activity_logs(ActivityLogFilter::All, None).await.unwrap();
        assert_eq!(audits_for(&logs, "R-2"), 3);
        let types: Vec<_> = logs.iter().map(|l| l.activity_type.clone()).collect();
        assert!(types.contains(&ActivityType::RollHistoryCreated));
        assert!(types.contains(&ActivityType::RollHistoryUpdated));
        assert!(types.contains(&ActivityType::RollHistoryDeleted));
    }

    #[tokio::test]
    async fn test_update_and_delete_require_id() {
        let repo = create_test_repo();
        let err = repo.update_roll_history(lift("R-3")).await.unwrap_err();
        assert!(matches!(err, Error::MissingId { ref roll_id } if roll_id == "R-3"));
        assert!(repo.delete_roll_history(lift("R-3")).await.is_err());

        let logs = repo.activity_logs(ActivityLogFilter::All, None).await.unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_row_writes_no_audit() {
        let repo = create_test_repo();
        let ghost = RollHistoryEntry {
            id: Some(999),
            ..lift("R-4")
        };

        assert!(!repo.update_roll_history(ghost.clone()).await.unwrap());
        assert!(!repo.delete_roll_history(ghost).await.unwrap());
        assert!(repo
            .activity_logs(ActivityLogFilter::All, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_by_roll_id() {
        let repo = create_test_repo();
        let entry = lift("R-5").with_location("Pier 4").with_notes("Tag line used");
        let id = repo.insert_roll_history(entry.clone()).await.unwrap();

        let stored = repo.roll_history_by_roll_id("R-5").await.unwrap().unwrap();
        assert_eq!(stored, RollHistoryEntry { id: Some(id), ..entry });
        assert!(repo.roll_history_by_roll_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_older_than_is_strict() {
        let repo = create_test_repo();
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        repo.insert_roll_history(lift("old").at(cutoff - Duration::seconds(1)))
            .await
            .unwrap();
        repo.insert_roll_history(lift("edge").at(cutoff)).await.unwrap();
        repo.log_activity(
            ActivityLogEntry::new("rigger-1", ActivityType::from("LOGIN"), "Signed in")
                .at(cutoff - Duration::days(1)),
        )
        .await
        .unwrap();

        let stats = repo.purge_older_than(cutoff).await.unwrap();
        assert_eq!(stats.roll_history, 1);
        // Audit entries are stamped now, so only the backdated login goes.
        assert_eq!(stats.activity_logs, 1);
        assert_eq!(stats.total(), 2);

        let rows = repo.roll_history(RollHistoryFilter::All, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].roll_id, "edge");
    }

    #[tokio::test]
    async fn test_purge_expired_uses_retention() {
        let repo = create_test_repo();
        let now = Utc::now();
        repo.insert_roll_history(lift("ancient").at(now - Duration::days(31)))
            .await
            .unwrap();
        repo.insert_roll_history(lift("recent").at(now - Duration::days(29)))
            .await
            .unwrap();

        let stats = repo.purge_expired(now).await.unwrap();
        assert_eq!(stats.roll_history, 1);
    }

    #[tokio::test]
    async fn test_purge_expired_unlimited_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let repo = DataRepository::new(db, None);
        repo.insert_roll_history(lift("R").at(Utc::now() - Duration::days(5000)))
            .await
            .unwrap();

        assert_eq!(repo.purge_expired(Utc::now()).await.unwrap(), PurgeStats::default());
    }

    #[tokio::test]
    async fn test_filters_pass_through() {
        let repo = create_test_repo();
        repo.insert_roll_history(lift("A")).await.unwrap();
        repo.insert_roll_history(
            RollHistoryEntry::new("B", "rigger-2", "Dogman signal check", "scheduled"),
        )
        .await
        .unwrap();

        let mine = repo
            .roll_history(RollHistoryFilter::User("rigger-2".to_string()), None)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].roll_id, "B");

        let created = repo
            .activity_logs(ActivityLogFilter::Type(ActivityType::RollHistoryCreated), Some(1))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_live_feed_sees_mutations() {
        let repo = create_test_repo();
        let mut rx = repo
            .watch_roll_history(RollHistoryFilter::User("rigger-1".to_string()))
            .await
            .unwrap();
        assert!(rx.borrow_and_update().is_empty());

        let id = repo.insert_roll_history(lift("R-6")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        let rows = rx.borrow_and_update().clone();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, Some(id));

        // Another user's row leaves this feed untouched.
        repo.insert_roll_history(RollHistoryEntry::new("X", "rigger-9", "d", "s"))
            .await
            .unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_activity_feed_follows_entity() {
        let repo = create_test_repo();
        let rx = repo
            .watch_activity_logs(ActivityLogFilter::Entity {
                id: "R-7".to_string(),
                entity_type: ROLL_HISTORY_ENTITY.to_string(),
            })
            .await
            .unwrap();

        let id = repo.insert_roll_history(lift("R-7")).await.unwrap();
        let stored = repo.roll_history_by_id(id).await.unwrap().unwrap();
        repo.delete_roll_history(stored).await.unwrap();

        let logs = rx.borrow().clone();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_feeds_are_dropped() {
        let repo = create_test_repo();
        let rx = repo.watch_roll_history(RollHistoryFilter::All).await.unwrap();
        assert_eq!(repo.live_feeds(), 1);

        drop(rx);
        repo.insert_roll_history(lift("R-8")).await.unwrap();
        assert_eq!(repo.live_feeds(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let repo = create_test_repo();
        repo.insert_roll_history(lift("R-9")).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.roll_history_count, 1);
        assert_eq!(stats.activity_log_count, 1);
    }
}
