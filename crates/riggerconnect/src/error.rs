//! Error types for riggerconnect.
//!
//! This module defines all error types used throughout the riggerconnect crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for riggerconnect operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A roll history entry was updated or deleted before it had an id.
    #[error("roll history entry '{roll_id}' has no assigned id")]
    MissingId {
        /// Business identifier of the entry.
        roll_id: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Delivery Errors ===
    /// No mail client could be resolved to hand a message to.
    #[error("no email client available")]
    MailUnavailable,

    /// A mail client accepted a message but failed to deliver it.
    #[error("failed to deliver email '{subject}': {message}")]
    MailDelivery {
        /// Subject of the message that failed.
        subject: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A feedback category or type name was not recognised.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// What was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    // === Runtime Errors ===
    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for riggerconnect operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a mail delivery error.
    #[must_use]
    pub fn mail_delivery(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MailDelivery {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create an error for an unrecognised enum name.
    #[must_use]
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }

    /// Check if this error means no mail client could be resolved.
    #[must_use]
    pub fn is_mail_unavailable(&self) -> bool {
        matches!(self, Self::MailUnavailable)
    }

    /// Check if this error came from the database.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. } | Self::DatabaseQuery(_) | Self::DatabaseMigration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MailUnavailable;
        assert_eq!(err.to_string(), "no email client available");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_error_is_mail_unavailable() {
        assert!(Error::MailUnavailable.is_mail_unavailable());
        assert!(!Error::internal("test").is_mail_unavailable());
    }

    #[test]
    fn test_missing_id_display() {
        let err = Error::MissingId {
            roll_id: "ROLL-7".to_string(),
        };
        assert!(err.to_string().contains("ROLL-7"));
    }

    #[test]
    fn test_mail_delivery_error() {
        let err = Error::mail_delivery("Technical Issue", "outbox is read-only");
        let msg = err.to_string();
        assert!(msg.contains("Technical Issue"));
        assert!(msg.contains("outbox is read-only"));
    }

    #[test]
    fn test_unknown_variant_error() {
        let err = Error::unknown_variant("feedback category", "gossip");
        assert_eq!(err.to_string(), "unknown feedback category: gossip");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.is_database_error());
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
            assert!(!err.is_database_error());
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
        assert!(err.is_database_error());
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid support_email".to_string(),
        };
        assert!(err.to_string().contains("invalid support_email"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
