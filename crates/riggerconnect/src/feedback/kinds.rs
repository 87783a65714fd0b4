//! Feedback categories, rigger feedback types and their routing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A configured destination mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// General support inbox.
    Support,
    /// Business and partnerships inbox.
    Business,
    /// Development team inbox.
    Technical,
}

impl Recipient {
    /// Snake-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Business => "business",
            Self::Technical => "technical",
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recipient {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "support" => Ok(Self::Support),
            "business" => Ok(Self::Business),
            "technical" => Ok(Self::Technical),
            other => Err(Error::unknown_variant("recipient", other)),
        }
    }
}

/// Where a submission goes and what it is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Mailboxes, all addressed on a single message.
    pub recipients: &'static [Recipient],
    /// Email subject line.
    pub subject: &'static str,
}

/// User-facing feedback category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    /// Something is broken.
    BugReport,
    /// Something is missing.
    FeatureRequest,
    /// A safety problem on site or in the app.
    SafetyConcern,
    /// Problem with a job posting or placement.
    JobIssue,
    /// Help with licences and tickets.
    CertificationHelp,
    /// Payment problem.
    PaymentIssue,
    /// Anything else.
    GeneralFeedback,
    /// Partnership or commercial enquiry.
    BusinessInquiry,
}

impl FeedbackCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 8] = [
        Self::BugReport,
        Self::FeatureRequest,
        Self::SafetyConcern,
        Self::JobIssue,
        Self::CertificationHelp,
        Self::PaymentIssue,
        Self::GeneralFeedback,
        Self::BusinessInquiry,
    ];

    /// Snake-case wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BugReport => "bug_report",
            Self::FeatureRequest => "feature_request",
            Self::SafetyConcern => "safety_concern",
            Self::JobIssue => "job_issue",
            Self::CertificationHelp => "certification_help",
            Self::PaymentIssue => "payment_issue",
            Self::GeneralFeedback => "general_feedback",
            Self::BusinessInquiry => "business_inquiry",
        }
    }

    /// Wire name with underscores replaced by spaces.
    #[must_use]
    pub fn words(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Recipients and subject for a submission in this category.
    #[must_use]
    pub fn route(&self) -> Route {
        use Recipient::{Business, Support, Technical};
        match self {
            Self::SafetyConcern => Route {
                recipients: &[Support, Business],
                subject: "URGENT: Safety Concern",
            },
            Self::BusinessInquiry => Route {
                recipients: &[Business],
                subject: "Business Inquiry",
            },
            Self::BugReport => Route {
                recipients: &[Technical],
                subject: "Technical Issue",
            },
            _ => Route {
                recipients: &[Support],
                subject: "General Feedback",
            },
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::unknown_variant("feedback category", s))
    }
}

/// Urgency attached to rigger feedback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPriority {
    /// Can wait.
    Low,
    /// Normal handling.
    #[default]
    Medium,
    /// Handle soon.
    High,
    /// Handle immediately.
    Critical,
}

impl FeedbackPriority {
    /// Snake-case wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for FeedbackPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::unknown_variant("feedback priority", other)),
        }
    }
}

/// Industry-specific feedback raised by riggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum RiggerFeedbackType {
    SafetyViolation,
    EquipmentMalfunction,
    TrainingIssue,
    JobSiteConcern,
    CertificationProblem,
    PaymentDispute,
    RegulatoryCompliance,
    PlatformSuggestion,
    NetworkIssue,
    DataAccuracy,
    UserExperience,
    PerformanceIssue,
}

impl RiggerFeedbackType {
    /// Every type, in display order.
    pub const ALL: [Self; 12] = [
        Self::SafetyViolation,
        Self::EquipmentMalfunction,
        Self::TrainingIssue,
        Self::JobSiteConcern,
        Self::CertificationProblem,
        Self::PaymentDispute,
        Self::RegulatoryCompliance,
        Self::PlatformSuggestion,
        Self::NetworkIssue,
        Self::DataAccuracy,
        Self::UserExperience,
        Self::PerformanceIssue,
    ];

    /// Snake-case wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafetyViolation => "safety_violation",
            Self::EquipmentMalfunction => "equipment_malfunction",
            Self::TrainingIssue => "training_issue",
            Self::JobSiteConcern => "job_site_concern",
            Self::CertificationProblem => "certification_problem",
            Self::PaymentDispute => "payment_dispute",
            Self::RegulatoryCompliance => "regulatory_compliance",
            Self::PlatformSuggestion => "platform_suggestion",
            Self::NetworkIssue => "network_issue",
            Self::DataAccuracy => "data_accuracy",
            Self::UserExperience => "user_experience",
            Self::PerformanceIssue => "performance_issue",
        }
    }

    /// Recipients and subject for this type.
    #[must_use]
    pub fn route(&self) -> Route {
        use Recipient::{Business, Support, Technical};
        match self {
            Self::SafetyViolation => Route {
                recipients: &[Support, Business, Technical],
                subject: "CRITICAL: Safety Violation Report",
            },
            Self::EquipmentMalfunction => Route {
                recipients: &[Support],
                subject: "Equipment Issue Report",
            },
            Self::TrainingIssue => Route {
                recipients: &[Business],
                subject: "Training Program Feedback",
            },
            Self::JobSiteConcern => Route {
                recipients: &[Support],
                subject: "Job Site Concern",
            },
            Self::RegulatoryCompliance => Route {
                recipients: &[Business],
                subject: "Regulatory Compliance Issue",
            },
            _ => Route {
                recipients: &[Support],
                subject: "Rigger Platform Feedback",
            },
        }
    }

    /// Priority used when the caller gives none.
    #[must_use]
    pub fn implied_priority(&self) -> FeedbackPriority {
        match self {
            Self::SafetyViolation => FeedbackPriority::Critical,
            Self::EquipmentMalfunction | Self::RegulatoryCompliance | Self::PaymentDispute => {
                FeedbackPriority::High
            }
            Self::TrainingIssue | Self::JobSiteConcern | Self::CertificationProblem => {
                FeedbackPriority::Medium
            }
            Self::PlatformSuggestion
            | Self::NetworkIssue
            | Self::DataAccuracy
            | Self::UserExperience
            | Self::PerformanceIssue => FeedbackPriority::Low,
        }
    }
}

impl fmt::Display for RiggerFeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiggerFeedbackType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::unknown_variant("rigger feedback type", s))
    }
}
