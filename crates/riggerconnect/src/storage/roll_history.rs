//! Data access for the `roll_history` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{from_db_timestamp, sql_limit, to_db_timestamp, Database};
use crate::error::Result;
use crate::records::RollHistoryEntry;

const SELECT_COLUMNS: &str = r"
SELECT id, roll_id, user_id, equipment_id, timestamp, description, status, weight, location, notes
FROM roll_history
";

/// Which roll history rows to return. Results are always newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RollHistoryFilter {
    /// Every row.
    #[default]
    All,
    /// Rows recorded by one user.
    User(String),
    /// Rows with `start <= timestamp <= end`.
    DateRange {
        /// Inclusive lower bound.
        start: DateTime<Utc>,
        /// Inclusive upper bound.
        end: DateTime<Utc>,
    },
}

impl Database {
    /// Insert a roll history entry and return its row id.
    ///
    /// An entry that already carries an id replaces the row with that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_roll_history(&self, entry: &RollHistoryEntry) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO roll_history
                (id, roll_id, user_id, equipment_id, timestamp, description, status, weight, location, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                entry.id,
                entry.roll_id,
                entry.user_id,
                entry.equipment_id,
                to_db_timestamp(&entry.timestamp),
                entry.description,
                entry.status,
                entry.weight,
                entry.location,
                entry.notes,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(id, roll_id = %entry.roll_id, "Inserted roll history entry");
        Ok(id)
    }

    /// Overwrite the row with the entry's id.
    ///
    /// Returns `false` if no row has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_roll_history(&self, id: i64, entry: &RollHistoryEntry) -> Result<bool> {
        let affected = self.conn.execute(
            r"
            UPDATE roll_history SET
                roll_id = ?2, user_id = ?3, equipment_id = ?4, timestamp = ?5,
                description = ?6, status = ?7, weight = ?8, location = ?9, notes = ?10
            WHERE id = ?1
            ",
            params![
                id,
                entry.roll_id,
                entry.user_id,
                entry.equipment_id,
                to_db_timestamp(&entry.timestamp),
                entry.description,
                entry.status,
                entry.weight,
                entry.location,
                entry.notes,
            ],
        )?;
        Ok(affected > 0)
    }

    /// Delete the row with the given id.
    ///
    /// Returns `false` if no row has that id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_roll_history(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM roll_history WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Get a roll history entry by row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn roll_history(&self, id: i64) -> Result<Option<RollHistoryEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                row_to_roll_history,
            )
            .optional()?;
        Ok(entry)
    }

    /// Get the newest entry with the given business id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn roll_history_by_roll_id(&self, roll_id: &str) -> Result<Option<RollHistoryEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE roll_id = ?1 ORDER BY timestamp DESC LIMIT 1"),
                [roll_id],
                row_to_roll_history,
            )
            .optional()?;
        Ok(entry)
    }

    /// List entries matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn query_roll_history(
        &self,
        filter: &RollHistoryFilter,
        limit: Option<usize>,
    ) -> Result<Vec<RollHistoryEntry>> {
        let limit = sql_limit(limit);
        let entries = match filter {
            RollHistoryFilter::All => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} ORDER BY timestamp DESC, id DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map([limit], row_to_roll_history)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            RollHistoryFilter::User(user_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![user_id, limit], row_to_roll_history)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            RollHistoryFilter::DateRange { start, end } => {
                let mut stmt = self.conn.prepare(&format!(
                    "{SELECT_COLUMNS} WHERE timestamp BETWEEN ?1 AND ?2 \
                     ORDER BY timestamp DESC, id DESC LIMIT ?3"
                ))?;
                let rows = stmt.query_map(
                    params![to_db_timestamp(start), to_db_timestamp(end), limit],
                    row_to_roll_history,
                )?;
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
    pub fn delete_roll_history_before(&self, cutoff: &DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM roll_history WHERE timestamp < ?1",
            [to_db_timestamp(cutoff)],
        )?;
        Ok(affected)
    }

    /// Count roll history rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_roll_history(&self) -> Result<i64> {
        self.count("roll_history")
    }
}

fn row_to_roll_history(row: &Row) -> rusqlite::Result<RollHistoryEntry> {
    let timestamp: String = row.get(4)?;
    Ok(RollHistoryEntry {
        id: Some(row.get(0)?),
        roll_id: row.get(1)?,
        user_id: row.get(2)?,
        equipment_id: row.get(3)?,
        timestamp: from_db_timestamp(4, &timestamp)?,
        description: row.get(5)?,
        status: row.get(6)?,
        weight: row.get(7)?,
        location: row.get(8)?,
        notes: row.get(9)?,
    })
}
