//! Persistent record types for riggerconnect.
//!
//! A [`RollHistoryEntry`] logs one movement of equipment or material. An
//! [`ActivityLogEntry`] is one line of the audit trail that the repository
//! appends whenever roll history changes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity type recorded on audit entries that point at roll history rows.
pub const ROLL_HISTORY_ENTITY: &str = "ROLL_HISTORY";

/// A logged equipment or material movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollHistoryEntry {
    /// Row id (assigned by the storage layer, immutable afterwards).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Business identifier of the roll.
    pub roll_id: String,
    /// User who recorded the movement.
    pub user_id: String,
    /// Equipment involved, if any.
    pub equipment_id: Option<String>,
    /// When the movement happened.
    pub timestamp: DateTime<Utc>,
    /// Free-text description.
    pub description: String,
    /// Workflow status, e.g. `scheduled` or `completed`.
    pub status: String,
    /// Load weight in kilograms.
    pub weight: Option<f64>,
    /// Site or location label.
    pub location: Option<String>,
    /// Additional notes.
    pub notes: Option<String>,
}

impl RollHistoryEntry {
    /// Create an entry timestamped now with no optional fields set.
    #[must_use]
    pub fn new(
        roll_id: impl Into<String>,
        user_id: impl Into<String>,
        description: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            roll_id: roll_id.into(),
            user_id: user_id.into(),
            equipment_id: None,
            timestamp: Utc::now(),
            description: description.into(),
            status: status.into(),
            weight: None,
            location: None,
            notes: None,
        }
    }

    /// Set the equipment id.
    #[must_use]
    pub fn with_equipment(mut self, equipment_id: impl Into<String>) -> Self {
        self.equipment_id = Some(equipment_id.into());
        self
    }

    /// Set the load weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Kind of action recorded in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ActivityType {
    /// A roll history entry was inserted.
    RollHistoryCreated,
    /// A roll history entry was updated.
    RollHistoryUpdated,
    /// A roll history entry was deleted.
    RollHistoryDeleted,
    /// Any other activity appended directly by the caller.
    Custom(String),
}

impl ActivityType {
    /// The stored name of this activity type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::RollHistoryCreated => "ROLL_HISTORY_CREATED",
            Self::RollHistoryUpdated => "ROLL_HISTORY_UPDATED",
            Self::RollHistoryDeleted => "ROLL_HISTORY_DELETED",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<&str> for ActivityType {
    fn from(value: &str) -> Self {
        match value {
            "ROLL_HISTORY_CREATED" => Self::RollHistoryCreated,
            "ROLL_HISTORY_UPDATED" => Self::RollHistoryUpdated,
            "ROLL_HISTORY_DELETED" => Self::RollHistoryDeleted,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        match value {
            ActivityType::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for ActivityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// One line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Row id (assigned by the storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// User the activity is attributed to.
    pub user_id: String,
    /// When the activity happened.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub activity_type: ActivityType,
    /// Human-readable summary.
    pub description: String,
    /// Id of the entity the activity refers to. Not a foreign key.
    pub related_entity_id: Option<String>,
    /// Type of the entity the activity refers to.
    pub related_entity_type: Option<String>,
    /// Free-form JSON details.
    pub metadata: Option<serde_json::Value>,
}

impl ActivityLogEntry {
    /// Create an entry timestamped now with no related entity.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        activity_type: ActivityType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            timestamp: Utc::now(),
            activity_type,
            description: description.into(),
            related_entity_id: None,
            related_entity_type: None,
            metadata: None,
        }
    }

    /// Point the entry at a related entity.
    #[must_use]
    pub fn related_to(mut self, entity_id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        self.related_entity_id = Some(entity_id.into());
        self.related_entity_type = Some(entity_type.into());
        self
    }

    /// Attach JSON metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
