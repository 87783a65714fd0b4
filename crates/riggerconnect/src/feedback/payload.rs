//! Feedback payloads serialized as email bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kinds::{FeedbackCategory, FeedbackPriority, RiggerFeedbackType};
use crate::system::{SystemInfo, UserContext};

/// A general feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    /// Feedback category.
    pub category: FeedbackCategory,
    /// Free-text message.
    pub message: String,
    /// Reply address, or `anonymous`.
    pub user_email: String,
    /// Display name, or `anonymous`.
    pub user_name: String,
    /// Submission time.
    pub timestamp: DateTime<Utc>,
    /// Application version.
    pub app_version: String,
    /// Device details, when the user opted in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_info: Option<SystemInfo>,
}

/// A rigger-specific feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiggerFeedbackPayload {
    /// Feedback type.
    pub feedback_type: RiggerFeedbackType,
    /// Effective priority.
    pub priority: FeedbackPriority,
    /// Submission time.
    pub timestamp: DateTime<Utc>,
    /// Structured details supplied by the caller.
    pub details: BTreeMap<String, String>,
    /// Application version.
    pub app_version: String,
    /// Locale and clock of the submitter.
    pub user_context: UserContext,
}

impl RiggerFeedbackPayload {
    /// Total characters across all detail values.
    #[must_use]
    pub fn message_length(&self) -> usize {
        self.details.values().map(|v| v.chars().count()).sum()
    }
}
