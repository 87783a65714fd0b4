//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand, ValueEnum};

use crate::feedback::{FeedbackCategory, FeedbackPriority, Recipient, RiggerFeedbackType};
use crate::records::{ActivityType, ROLL_HISTORY_ENTITY};

/// Feedback commands.
#[derive(Debug, Subcommand)]
pub enum FeedbackCommand {
    /// Submit general feedback
    Submit {
        /// Feedback category (e.g. safety_concern, bug_report)
        #[arg(value_parser = parse_category)]
        category: FeedbackCategory,

        /// The feedback message
        message: String,

        /// Reply address
        #[arg(short, long)]
        email: Option<String>,

        /// Your name
        #[arg(short, long)]
        name: Option<String>,

        /// Don't attach device details
        #[arg(long)]
        no_system_info: bool,
    },

    /// Submit rigger-specific feedback
    Report {
        /// Feedback type (e.g. safety_violation, equipment_malfunction)
        #[arg(value_parser = parse_rigger_type)]
        feedback_type: RiggerFeedbackType,

        /// Detail as KEY=VALUE (repeatable)
        #[arg(short, long = "detail", value_parser = parse_detail)]
        details: Vec<(String, String)>,

        /// Override the implied priority
        #[arg(short, long, value_parser = parse_priority)]
        priority: Option<FeedbackPriority>,
    },

    /// Report an application error as high-priority feedback
    Error {
        /// Error message
        message: String,

        /// Stack trace or extra context
        #[arg(long)]
        stack_trace: Option<String>,
    },

    /// Prepare a pre-filled email to one mailbox
    Compose {
        /// Feedback category
        #[arg(value_parser = parse_category)]
        category: FeedbackCategory,

        /// Text to pre-fill
        #[arg(short, long, default_value = "")]
        message: String,

        /// Mailbox to address
        #[arg(short, long, value_enum, default_value = "support")]
        to: RecipientArg,

        /// Print the mailto: URI as well
        #[arg(long)]
        uri: bool,
    },
}

/// Roll history commands.
#[derive(Debug, Subcommand)]
pub enum RollCommand {
    /// Record a new roll history entry
    Add(RollAddCommand),

    /// Change fields of an existing entry
    Update(RollUpdateCommand),

    /// Delete an entry by row id
    Delete {
        /// Row id
        id: i64,
    },

    /// Show the newest entry for a roll id
    Show {
        /// Business roll id
        roll_id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List entries, newest first
    List(RollListCommand),
}

/// Arguments for `roll add`.
#[derive(Debug, Args)]
pub struct RollAddCommand {
    /// Business roll id
    pub roll_id: String,

    /// User recording the movement
    #[arg(short, long)]
    pub user: String,

    /// What was moved
    #[arg(short, long)]
    pub description: String,

    /// Workflow status
    #[arg(short, long, default_value = "completed")]
    pub status: String,

    /// Equipment id
    #[arg(short, long)]
    pub equipment: Option<String>,

    /// Load weight in kilograms
    #[arg(short, long)]
    pub weight: Option<f64>,

    /// Site or location
    #[arg(short, long)]
    pub location: Option<String>,

    /// Additional notes
    #[arg(long)]
    pub notes: Option<String>,

    /// When it happened (defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub at: Option<DateTime<Utc>>,
}

/// Arguments for `roll update`.
#[derive(Debug, Args)]
pub struct RollUpdateCommand {
    /// Row id
    pub id: i64,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New status
    #[arg(short, long)]
    pub status: Option<String>,

    /// New equipment id
    #[arg(short, long)]
    pub equipment: Option<String>,

    /// New load weight
    #[arg(short, long)]
    pub weight: Option<f64>,

    /// New location
    #[arg(short, long)]
    pub location: Option<String>,

    /// New notes
    #[arg(long)]
    pub notes: Option<String>,
}

/// Arguments for `roll list`.
#[derive(Debug, Args)]
pub struct RollListCommand {
    /// Only entries by this user
    #[arg(short, long, conflicts_with_all = ["since", "until"])]
    pub user: Option<String>,

    /// Entries at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// Entries at or before this time
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<DateTime<Utc>>,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Activity log commands.
#[derive(Debug, Subcommand)]
pub enum ActivityCommand {
    /// List activity, newest first
    List(ActivityListCommand),

    /// Append an activity entry
    Log {
        /// Activity type, e.g. LOGIN
        activity_type: String,

        /// Description
        description: String,

        /// User the activity belongs to
        #[arg(short, long)]
        user: String,

        /// Related entity id
        #[arg(long)]
        entity_id: Option<String>,

        /// Related entity type
        #[arg(long, requires = "entity_id")]
        entity_type: Option<String>,

        /// Metadata as a JSON document
        #[arg(long, value_parser = parse_json)]
        metadata: Option<serde_json::Value>,
    },
}

/// Arguments for `activity list`.
#[derive(Debug, Args)]
#[command(group = clap::ArgGroup::new("filter").multiple(false).args(["user", "activity_type", "entity_id", "since"]))]
pub struct ActivityListCommand {
    /// Only entries by this user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Only entries of this type
    #[arg(short = 't', long = "type")]
    pub activity_type: Option<String>,

    /// Only entries about this entity
    #[arg(long)]
    pub entity_id: Option<String>,

    /// Entity type used with --entity-id
    #[arg(long, default_value = ROLL_HISTORY_ENTITY)]
    pub entity_type: String,

    /// Entries at or after this time
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,

    /// Entries at or before this time (requires --since)
    #[arg(long, value_parser = parse_timestamp, requires = "since")]
    pub until: Option<DateTime<Utc>>,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ActivityListCommand {
    /// The activity type filter, if given.
    #[must_use]
    pub fn activity_type(&self) -> Option<ActivityType> {
        self.activity_type.as_deref().map(ActivityType::from)
    }
}

/// Purge command arguments.
#[derive(Debug, Args)]
pub struct PurgeCommand {
    /// Delete rows strictly older than this time; defaults to the retention period
    #[arg(long, value_parser = parse_timestamp)]
    pub before: Option<DateTime<Utc>>,

    /// Show the cutoff without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Mailbox argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecipientArg {
    /// Support inbox
    Support,
    /// Business inbox
    Business,
    /// Development team inbox
    Technical,
}

impl From<RecipientArg> for Recipient {
    fn from(arg: RecipientArg) -> Self {
        match arg {
            RecipientArg::Support => Self::Support,
            RecipientArg::Business => Self::Business,
            RecipientArg::Technical => Self::Technical,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

fn parse_category(s: &str) -> Result<FeedbackCategory, String> {
    s.parse().map_err(|e: crate::Error| e.to_string())
}

fn parse_rigger_type(s: &str) -> Result<RiggerFeedbackType, String> {
    s.parse().map_err(|e: crate::Error| e.to_string())
}

fn parse_priority(s: &str) -> Result<FeedbackPriority, String> {
    s.parse().map_err(|e: crate::Error| e.to_string())
}

fn parse_detail(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}

/// Parse RFC 3339, or a bare `YYYY-MM-DD` meaning midnight UTC.
///
/// # Errors
///
/// Returns a message if neither form matches.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("expected RFC 3339 or YYYY-MM-DD, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_recipient_arg_conversion() {
        assert_eq!(Recipient::from(RecipientArg::Support), Recipient::Support);
        assert_eq!(Recipient::from(RecipientArg::Business), Recipient::Business);
        assert_eq!(Recipient::from(RecipientArg::Technical), Recipient::Technical);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_parse_detail() {
        assert_eq!(
            parse_detail("site=Pier 4").unwrap(),
            ("site".to_string(), "Pier 4".to_string())
        );
        assert_eq!(
            parse_detail("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_detail("no-equals").is_err());
        assert!(parse_detail("=value").is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp("2024-03-01T10:30:00+08:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 2, 30, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(parse_category("bug_report").unwrap(), FeedbackCategory::BugReport);
        assert!(parse_category("bug").unwrap_err().contains("bug"));
        assert_eq!(
            parse_rigger_type("training_issue").unwrap(),
            RiggerFeedbackType::TrainingIssue
        );
        assert_eq!(parse_priority("critical").unwrap(), FeedbackPriority::Critical);
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(
            parse_json(r#"{"a":1}"#).unwrap(),
            serde_json::json!({"a": 1})
        );
        assert!(parse_json("{").is_err());
    }
}
