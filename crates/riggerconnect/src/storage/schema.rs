//! `SQLite` schema definitions for riggerconnect.
//!
//! This module contains the SQL statements for creating and dropping
//! the database schema.

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create the roll history table.
pub const CREATE_ROLL_HISTORY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS roll_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    roll_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    equipment_id TEXT,
    timestamp TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL,
    weight REAL,
    location TEXT,
    notes TEXT
)
";

/// SQL statement to create the activity log table.
pub const CREATE_ACTIVITY_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    description TEXT NOT NULL,
    related_entity_id TEXT,
    related_entity_type TEXT,
    metadata TEXT
)
";

/// Roll history lookups by timestamp (listing, purging).
pub const CREATE_ROLL_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_roll_history_timestamp ON roll_history(timestamp DESC)
";

/// Roll history lookups by user.
pub const CREATE_ROLL_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_roll_history_user ON roll_history(user_id)
";

/// Roll history lookups by business id.
pub const CREATE_ROLL_ID_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_roll_history_roll_id ON roll_history(roll_id)
";

/// Activity log lookups by timestamp (listing, purging).
pub const CREATE_ACTIVITY_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_activity_logs_timestamp ON activity_logs(timestamp DESC)
";

/// Activity log lookups by user.
pub const CREATE_ACTIVITY_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_activity_logs_user ON activity_logs(user_id)
";

/// Activity log lookups by type.
pub const CREATE_ACTIVITY_TYPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_activity_logs_type ON activity_logs(activity_type)
";

/// Activity log lookups by related entity.
pub const CREATE_ACTIVITY_ENTITY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_activity_logs_entity
    ON activity_logs(related_entity_id, related_entity_type)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_METADATA_TABLE,
    CREATE_ROLL_HISTORY_TABLE,
    CREATE_ACTIVITY_LOGS_TABLE,
    CREATE_ROLL_TIMESTAMP_INDEX,
    CREATE_ROLL_USER_INDEX,
    CREATE_ROLL_ID_INDEX,
    CREATE_ACTIVITY_TIMESTAMP_INDEX,
    CREATE_ACTIVITY_USER_INDEX,
    CREATE_ACTIVITY_TYPE_INDEX,
    CREATE_ACTIVITY_ENTITY_INDEX,
];

/// Drops every data table. Indexes go with their tables.
pub const DROP_DATA_TABLES: &str = r"
DROP TABLE IF EXISTS roll_history;
DROP TABLE IF EXISTS activity_logs;
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_roll_history_table_columns() {
        for column in [
            "roll_id TEXT NOT NULL",
            "user_id TEXT NOT NULL",
            "equipment_id TEXT",
            "timestamp TEXT NOT NULL",
            "status TEXT NOT NULL",
            "weight REAL",
        ] {
            assert!(CREATE_ROLL_HISTORY_TABLE.contains(column), "{column}");
        }
    }

    #[test]
    fn test_activity_logs_table_has_no_foreign_key() {
        assert!(CREATE_ACTIVITY_LOGS_TABLE.contains("related_entity_id TEXT"));
        assert!(!CREATE_ACTIVITY_LOGS_TABLE.contains("REFERENCES"));
    }
}
