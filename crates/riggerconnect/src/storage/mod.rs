//! Storage layer for riggerconnect.
//!
//! This module provides `SQLite`-based persistent storage for roll history
//! and the activity log. The data-access methods for each table live in
//! their own submodule as `impl Database` blocks.

mod activity_log;
pub mod migrations;
mod roll_history;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{types::Type, Connection};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use activity_log::ActivityLogFilter;
pub use roll_history::RollHistoryFilter;

/// Handle to the local database.
///
/// Holds one `SQLite` connection. The handle is `Send` but not `Sync`; share
/// it behind a mutex.
#[derive(Debug)]
pub struct Database {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let roll_history_count = self.count_roll_history()?;
        let activity_log_count = self.count_activity_logs()?;

        let bounds: (Option<String>, Option<String>) = self.conn.query_row(
            r"
            SELECT MIN(timestamp), MAX(timestamp) FROM (
                SELECT timestamp FROM roll_history
                UNION ALL
                SELECT timestamp FROM activity_logs
            )
            ",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let parse = |s: Option<String>| {
            s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            roll_history_count,
            activity_log_count,
            oldest_entry: parse(bounds.0),
            newest_entry: parse(bounds.1),
            db_size_bytes,
        })
    }

    /// Stored schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata table cannot be read.
    pub fn schema_version(&self) -> Result<i32> {
        migrations::get_schema_version(&self.conn)
    }

    fn count(&self, table: &str) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
        Ok(count)
    }
}

/// Statistics about the database.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Rows in `roll_history`.
    pub roll_history_count: i64,
    /// Rows in `activity_logs`.
    pub activity_log_count: i64,
    /// Oldest timestamp across both tables.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Newest timestamp across both tables.
    pub newest_entry: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Format a timestamp for storage.
///
/// Fixed-width nanosecond RFC 3339 in UTC, so string order matches time order.
pub(crate) fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp in column `idx`.
pub(crate) fn from_db_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Convert a row limit to the integer `SQLite` expects.
pub(crate) fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::records::{ActivityLogEntry, ActivityType, RollHistoryEntry};

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.path().to_string_lossy(), ":memory:");
        assert_eq!(db.schema_version().unwrap(), migrations::CURRENT_VERSION);
    }

    #[test]
    fn test_db_timestamp_is_fixed_width_and_ordered() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let fractional = whole + Duration::nanoseconds(1);

        let a = to_db_timestamp(&whole);
        let b = to_db_timestamp(&fractional);

        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
        assert_eq!(from_db_timestamp(0, &b).unwrap(), fractional);
    }

    #[test]
    fn test_from_db_timestamp_rejects_garbage() {
        assert!(from_db_timestamp(4, "yesterday").is_err());
    }

    #[test]
    fn test_sql_limit() {
        assert_eq!(sql_limit(None), -1);
        assert_eq!(sql_limit(Some(5)), 5);
    }

    #[test]
    fn test_stats_empty() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.stats().unwrap();

        assert_eq!(stats.roll_history_count, 0);
        assert_eq!(stats.activity_log_count, 0);
        assert!(stats.oldest_entry.is_none());
        assert!(stats.newest_entry.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_spans_both_tables() {
        let db = Database::open_in_memory().unwrap();
        let early = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        db.insert_roll_history(&RollHistoryEntry::new("R1", "u1", "lift", "done").at(late))
            .unwrap();
        db.insert_activity_log(
            &ActivityLogEntry::new("u1", ActivityType::from("LOGIN"), "signed in").at(early),
        )
        .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.roll_history_count, 1);
        assert_eq!(stats.activity_log_count, 1);
        assert_eq!(stats.oldest_entry, Some(early));
        assert_eq!(stats.newest_entry, Some(late));
    }

    #[test]
    fn test_open_file_based_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("rigger.db");

        let db = Database::open(&db_path).unwrap();
        db.insert_roll_history(&RollHistoryEntry::new("R1", "u1", "lift", "done"))
            .unwrap();

        assert!(db_path.exists());
        assert_eq!(db.path(), db_path);
        assert!(db.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rigger.db");

        {
            let db = Database::open(&db_path).unwrap();
            db.insert_roll_history(&RollHistoryEntry::new("R1", "u1", "lift", "done"))
                .unwrap();
        }

        let db = Database::open(&db_path).unwrap();
        assert_eq!(db.count_roll_history().unwrap(), 1);
    }
}
