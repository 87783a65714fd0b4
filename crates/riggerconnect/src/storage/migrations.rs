//! Database versioning for riggerconnect.
//!
//! There is a single schema version. A database written by any other version
//! is not migrated: its data tables are dropped and recreated empty.

use rusqlite::Connection;
use tracing::warn;

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, DROP_DATA_TABLES, SCHEMA_STATEMENTS};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Initialize the database schema.
///
/// Fresh databases get the current schema. Databases stamped with a
/// different or unparseable version lose their roll history and activity logs.
///
/// # Errors
///
/// Returns an error if schema creation fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let version = match get_schema_version(conn) {
        Ok(version) => version,
        Err(Error::DatabaseMigration { message }) => {
            warn!("{message}, discarding existing data");
            conn.execute_batch(DROP_DATA_TABLES)?;
            -1
        }
        Err(e) => return Err(e),
    };
    if version > 0 && version != CURRENT_VERSION {
        warn!(
            from = version,
            to = CURRENT_VERSION,
            "Schema version mismatch, discarding existing data"
        );
        conn.execute_batch(DROP_DATA_TABLES)?;
    }

    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    if version != CURRENT_VERSION {
        set_schema_version(conn, CURRENT_VERSION)?;
    }
    Ok(())
}

/// Get the schema version stored in the database.
///
/// Returns 0 if no version is set (fresh database).
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Stamp the database with a schema version.
pub(crate) fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}
