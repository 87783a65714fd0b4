//! User feedback collection and delivery.
//!
//! Submissions are routed to one or more configured mailboxes by category or
//! rigger feedback type, serialized to JSON and handed to a [`MailClient`].

mod email;
mod kinds;
mod manager;
mod payload;

pub use email::{EmailAction, EmailMessage, MailClient, OutboxMailClient, UnavailableMailClient};
pub use kinds::{FeedbackCategory, FeedbackPriority, Recipient, RiggerFeedbackType, Route};
pub use manager::{email_subject, FeedbackManager, FeedbackRequest};
pub use payload::{FeedbackPayload, RiggerFeedbackPayload};
