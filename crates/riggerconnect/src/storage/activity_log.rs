//! Data access for the `activity_logs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, OptionalExtension, Row};
use tracing::trace;

use super::{from_db_timestamp, sql_limit, to_db_timestamp, Database};
use crate::error::Result;
use crate::records::{ActivityLogEntry, ActivityType};

const SELECT_COLUMNS: &str = r"
SELECT id, user_id, timestamp, activity_type, description, related_entity_id, related_entity_type, metadata
FROM activity_logs
";

/// Which activity log rows to return. Results are always newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivityLogFilter {
    /// Every row.
    #[default]
    All,
    /// Rows attributed to one user.
    User(String),
    /// Rows of one activity type.
    Type(ActivityType),
    /// Rows with `start <= timestamp <= end`.
    DateRange {
        /// Inclusive lower bound.
        start: DateTime<Utc>,
        /// Inclusive upper bound.
        end: DateTime<Utc>,
    },
    /// Rows pointing at one related entity.
    Entity {
        /// Related entity id.
        id: String,
        /// Related entity type.
        entity_type: String,
    },
}

impl Database {
    /// Append an activity log entry and return its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized or the insert fails.
    pub fn insert_activity_log(&self, entry: &ActivityLogEntry) -> Result<i64> {
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO activity_logs
                (id, user_id, timestamp, activity_type, description,
                 related_entity_id, related_entity_type, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                entry.id,
                entry.user_id,
                to_db_timestamp(&entry.timestamp),
                entry.activity_type.as_str(),
                entry.description,
                entry.related_entity_id,
                entry.related_entity_type,
                metadata,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        trace!(id, activity_type = %entry.activity_type, "Appended activity log entry");
        Ok(id)
    }

    /// Get an activity log entry by row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn activity_log(&self, id: i64) -> Result<Option<ActivityLogEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                row_to_activity_log,
            )
            .optional()?;
        Ok(entry)
    }

    /// List entries matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn query_activity_logs(
        &self,
        filter: &ActivityLogFilter,
        limit: Option<usize>,
    ) -> Result<Vec<ActivityLogEntry>> {
        const ORDER: &str = "ORDER BY timestamp DESC, id DESC";
        let limit = sql_limit(limit);

        let entries = match filter {
            ActivityLogFilter::All => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{SELECT_COLUMNS} {ORDER} LIMIT ?1"))?;
                let rows = stmt.query_map([limit], row_to_activity_log)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            ActivityLogFilter::User(user_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE user_id = ?1 {ORDER} LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![user_id, limit], row_to_activity_log)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            ActivityLogFilter::Type(activity_type) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE activity_type = ?1 {ORDER} LIMIT ?2"
                ))?;
                let rows = stmt.query_map(
                    params![activity_type.as_str(), limit],
                    row_to_activity_log,
                )?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            ActivityLogFilter::DateRange { start, end } => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE timestamp BETWEEN ?1 AND ?2 {ORDER} LIMIT ?3"
                ))?;
                let rows = stmt.query_map(
                    params![to_db_timestamp(start), to_db_timestamp(end), limit],
                    row_to_activity_log,
                )?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            ActivityLogFilter::Entity { id, entity_type } => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE related_entity_id = ?1 AND related_entity_type = ?2 \
                     {ORDER} LIMIT ?3"
                ))?;
                let rows =
                    stmt.query_map(params![id, entity_type, limit], row_to_activity_log)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(entries)
    }

    /// Delete entries strictly older than `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_activity_logs_before(&self, cutoff: &DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM activity_logs WHERE timestamp < ?1",
            [to_db_timestamp(cutoff)],
        )?;
        Ok(affected)
    }

    /// Count activity log rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_activity_logs(&self) -> Result<i64> {
        self.count("activity_logs")
    }
}

fn row_to_activity_log(row: &Row) -> rusqlite::Result<ActivityLogEntry> {
    let timestamp: String = row.get(2)?;
    let activity_type: String = row.get(3)?;
    let raw_metadata: Option<String> = row.get(7)?;

    let metadata: Option<serde_json::Value> = raw_metadata
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(ActivityLogEntry {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        timestamp: from_db_timestamp(2, &timestamp)?,
        activity_type: ActivityType::from(activity_type),
        description: row.get(4)?,
        related_entity_id: row.get(5)?,
        related_entity_type: row.get(6)?,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::records::ROLL_HISTORY_ENTITY;

    fn create_test_db() -> Database {
        Database::open_in_memory().expect("failed to create test database")
    }

    fn login(user: &str) -> ActivityLogEntry {
        ActivityLogEntry::new(user, ActivityType::from("LOGIN"), "Signed in")
    }

    #[test]
    fn test_insert_and_get_with_metadata() {
        let db = create_test_db();
        let entry = login("u1").with_metadata(serde_json::json!({"device": "tablet"}));

        let id = db.insert_activity_log(&entry).unwrap();
        let stored = db.activity_log(id).unwrap().unwrap();

        assert_eq!(stored, ActivityLogEntry { id: Some(id), ..entry });
    }

    #[test]
    fn test_query_by_user_and_type() {
        let db = create_test_db();
        db.insert_activity_log(&login("alice")).unwrap();
        db.insert_activity_log(&login("bob")).unwrap();
        db.insert_activity_log(&ActivityLogEntry::new(
            "bob",
            ActivityType::RollHistoryCreated,
            "created",
        ))
        .unwrap();

        let bob = db
            .query_activity_logs(&ActivityLogFilter::User("bob".to_string()), None)
            .unwrap();
        assert_eq!(bob.len(), 2);

        let created = db
            .query_activity_logs(
                &ActivityLogFilter::Type(ActivityType::RollHistoryCreated),
                None,
            )
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].user_id, "bob");
    }

    #[test]
    fn test_query_by_entity() {
        let db = create_test_db();
        db.insert_activity_log(&login("u1").related_to("R1", ROLL_HISTORY_ENTITY))
            .unwrap();
        db.insert_activity_log(&login("u1").related_to("R1", "JOB"))
            .unwrap();
        db.insert_activity_log(&login("u1").related_to("R2", ROLL_HISTORY_ENTITY))
            .unwrap();

        let rows = db
            .query_activity_logs(
                &ActivityLogFilter::Entity {
                    id: "R1".to_string(),
                    entity_type: ROLL_HISTORY_ENTITY.to_string(),
                },
                None,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].related_entity_type.as_deref(), Some("ROLL_HISTORY"));
    }

    #[test]
    fn test_query_by_date_range_newest_first() {
        let db = create_test_db();
        let base = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        for days in 0..5 {
            db.insert_activity_log(&login("u1").at(base + Duration::days(days)))
                .unwrap();
        }

        let rows = db
            .query_activity_logs(
                &ActivityLogFilter::DateRange {
                    start: base + Duration::days(1),
                    end: base + Duration::days(3),
                },
                None,
            )
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].timestamp, base + Duration::days(3));
        assert_eq!(rows[2].timestamp, base + Duration::days(1));
    }

    #[test]
    fn test_delete_before() {
        let db = create_test_db();
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db.insert_activity_log(&login("u1").at(cutoff - Duration::days(1)))
            .unwrap();
        db.insert_activity_log(&login("u1").at(cutoff)).unwrap();

        assert_eq!(db.delete_activity_logs_before(&cutoff).unwrap(), 1);
        assert_eq!(db.count_activity_logs().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_metadata_is_an_error() {
        let db = create_test_db();
        let id = db.insert_activity_log(&login("u1")).unwrap();
        db.conn
            .execute(
                "UPDATE activity_logs SET metadata = '{not json' WHERE id = ?1",
                [id],
            )
            .unwrap();

        assert!(db.activity_log(id).is_err());
    }
}
