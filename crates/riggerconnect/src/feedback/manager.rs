//! Routing and delivery of feedback submissions.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{debug, error, warn};

use super::email::{EmailAction, EmailMessage, MailClient};
use super::kinds::{FeedbackCategory, FeedbackPriority, Recipient, RiggerFeedbackType, Route};
use super::payload::{FeedbackPayload, RiggerFeedbackPayload};
use crate::config::FeedbackConfig;
use crate::error::Result;
use crate::monitoring::{CrashReporter, EventValue};
use crate::system::{SystemInfo, UserContext};

const CHOOSER_TITLE: &str = "Send Feedback";

/// Stands in for a missing reply address or name.
const ANONYMOUS: &str = "anonymous";

/// A general feedback submission as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRequest {
    /// Category chosen by the user.
    pub category: FeedbackCategory,
    /// Free-text message.
    pub message: String,
    /// Reply address.
    pub user_email: Option<String>,
    /// Display name.
    pub user_name: Option<String>,
    /// Attach device details. `None` defers to the configured default.
    pub include_system_info: Option<bool>,
}

impl FeedbackRequest {
    /// A request with no contact details, using the configured system info default.
    #[must_use]
    pub fn new(category: FeedbackCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            user_email: None,
            user_name: None,
            include_system_info: None,
        }
    }

    /// Set the reply address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Choose whether device details are attached.
    #[must_use]
    pub fn include_system_info(mut self, include: bool) -> Self {
        self.include_system_info = Some(include);
        self
    }
}

#[derive(Debug)]
struct Inner {
    support_email: String,
    business_email: String,
    technical_email: String,
    include_system_info: bool,
    app_version: String,
    mail: Arc<dyn MailClient>,
    crash: CrashReporter,
}

/// Builds feedback emails and hands them to a [`MailClient`].
///
/// Cheap to clone. Every operation swallows its own failures: they are logged
/// and forwarded to the crash reporter, never returned.
#[derive(Debug, Clone)]
pub struct FeedbackManager {
    inner: Arc<Inner>,
}

impl FeedbackManager {
    /// Create a manager using the configured mailbox addresses.
    #[must_use]
    pub fn new(
        config: &FeedbackConfig,
        app_version: impl Into<String>,
        mail: Arc<dyn MailClient>,
        crash: CrashReporter,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                support_email: config.support_email.clone(),
                business_email: config.business_email.clone(),
                technical_email: config.technical_email.clone(),
                include_system_info: config.include_system_info,
                app_version: app_version.into(),
                mail,
                crash,
            }),
        }
    }

    /// The configured address for a mailbox.
    #[must_use]
    pub fn address(&self, recipient: Recipient) -> &str {
        match recipient {
            Recipient::Support => &self.inner.support_email,
            Recipient::Business => &self.inner.business_email,
            Recipient::Technical => &self.inner.technical_email,
        }
    }

    /// Submit general feedback on a background task.
    ///
    /// Outside a Tokio runtime the submission is dropped with a warning.
    pub fn submit(&self, request: FeedbackRequest) {
        let this = self.clone();
        spawn_detached("feedback", async move { this.send_feedback(request).await });
    }

    /// Submit general feedback and wait for delivery to finish.
    pub async fn send_feedback(&self, request: FeedbackRequest) {
        let category = request.category;
        if let Err(e) = self.try_send_feedback(request).await {
            error!(%category, "Failed to submit feedback: {e}");
            self.inner
                .crash
                .log_exception(&e, Some("Feedback submission failed"));
        }
    }

    async fn try_send_feedback(&self, request: FeedbackRequest) -> Result<()> {
        let include_system_info = request
            .include_system_info
            .unwrap_or(self.inner.include_system_info);
        let has_user_email = request.user_email.is_some();
        let payload = FeedbackPayload {
            category: request.category,
            message: request.message,
            user_email: request.user_email.unwrap_or_else(|| ANONYMOUS.to_string()),
            user_name: request.user_name.unwrap_or_else(|| ANONYMOUS.to_string()),
            timestamp: Utc::now(),
            app_version: self.inner.app_version.clone(),
            system_info: include_system_info
                .then(|| SystemInfo::collect(&self.inner.app_version)),
        };

        self.inner.crash.log_event(
            "user_feedback_submitted",
            [
                ("feedback_category", EventValue::from(payload.category.as_str())),
                ("message_length", payload.message.chars().count().into()),
                ("has_user_email", has_user_email.into()),
                ("include_system_info", include_system_info.into()),
            ],
        );

        let body = serde_json::to_string(&payload)?;
        self.dispatch(self.send_message(payload.category.route(), body))
            .await?;
        debug!(category = %payload.category, "Feedback submitted");
        Ok(())
    }

    /// Submit rigger feedback on a background task.
    ///
    /// Without an explicit `priority` the type's implied priority is used.
    pub fn submit_typed(
        &self,
        feedback_type: RiggerFeedbackType,
        details: BTreeMap<String, String>,
        priority: Option<FeedbackPriority>,
    ) {
        let this = self.clone();
        spawn_detached("rigger feedback", async move {
            this.send_rigger_feedback(feedback_type, details, priority)
                .await;
        });
    }

    /// Submit rigger feedback and wait for delivery to finish.
    pub async fn send_rigger_feedback(
        &self,
        feedback_type: RiggerFeedbackType,
        details: BTreeMap<String, String>,
        priority: Option<FeedbackPriority>,
    ) {
        if let Err(e) = self
            .try_send_rigger_feedback(feedback_type, details, priority)
            .await
        {
            error!(%feedback_type, "Failed to submit rigger feedback: {e}");
            self.inner
                .crash
                .log_exception(&e, Some("Rigger feedback submission failed"));
        }
    }

    async fn try_send_rigger_feedback(
        &self,
        feedback_type: RiggerFeedbackType,
        details: BTreeMap<String, String>,
        priority: Option<FeedbackPriority>,
    ) -> Result<()> {
        let payload = RiggerFeedbackPayload {
            feedback_type,
            priority: priority.unwrap_or_else(|| feedback_type.implied_priority()),
            timestamp: Utc::now(),
            details,
            app_version: self.inner.app_version.clone(),
            user_context: UserContext::collect(),
        };

        self.inner.crash.log_event(
            "rigger_feedback_submitted",
            [
                ("feedback_type", EventValue::from(feedback_type.as_str())),
                ("priority", payload.priority.as_str().into()),
                ("message_length", payload.message_length().into()),
                ("has_user_email", false.into()),
            ],
        );

        let body = serde_json::to_string(&payload)?;
        self.dispatch(self.send_message(feedback_type.route(), body))
            .await?;
        debug!(%feedback_type, priority = %payload.priority, "Rigger feedback submitted");
        Ok(())
    }

    /// Open a pre-filled compose window addressed to one mailbox.
    ///
    /// Defaults to the support mailbox.
    pub async fn open_email_feedback(
        &self,
        category: FeedbackCategory,
        prefilled_message: &str,
        recipient: Option<Recipient>,
    ) {
        let recipient = recipient.unwrap_or(Recipient::Support);
        let message = self.compose_email(category, prefilled_message, recipient);
        let address = message.recipients.join(",");

        match self.dispatch(message).await {
            Ok(true) => self.inner.crash.log_event(
                "email_feedback_opened",
                [("category", category.as_str()), ("recipient", address.as_str())],
            ),
            Ok(false) => {}
            Err(e) => {
                error!(%category, "Failed to open email feedback: {e}");
                self.inner
                    .crash
                    .log_exception(&e, Some("Email feedback failed"));
            }
        }
    }

    /// Open a compose window prefilled with the action the user just took.
    pub async fn trigger_contextual_feedback(&self, action: &str, category: FeedbackCategory) {
        let message = format!("Feedback related to: {action}");
        self.open_email_feedback(category, &message, None).await;
    }

    /// Build the compose message used by [`open_email_feedback`](Self::open_email_feedback).
    #[must_use]
    pub fn compose_email(
        &self,
        category: FeedbackCategory,
        prefilled_message: &str,
        recipient: Recipient,
    ) -> EmailMessage {
        EmailMessage {
            action: EmailAction::Compose,
            recipients: vec![self.address(recipient).to_string()],
            subject: email_subject(category),
            body: self.email_body(category, prefilled_message),
            chooser_title: None,
        }
    }

    /// Report an application error as high-priority performance feedback.
    pub fn report_error(&self, error_message: &str, stack_trace: Option<&str>) {
        self.submit_typed(
            RiggerFeedbackType::PerformanceIssue,
            error_details(error_message, stack_trace),
            Some(FeedbackPriority::High),
        );
    }

    /// Like [`report_error`](Self::report_error), but waits for delivery.
    pub async fn send_error_report(&self, error_message: &str, stack_trace: Option<&str>) {
        self.send_rigger_feedback(
            RiggerFeedbackType::PerformanceIssue,
            error_details(error_message, stack_trace),
            Some(FeedbackPriority::High),
        )
        .await;
    }

    fn send_message(&self, route: Route, body: String) -> EmailMessage {
        EmailMessage {
            action: EmailAction::Send,
            recipients: route
                .recipients
                .iter()
                .map(|r| self.address(*r).to_string())
                .collect(),
            subject: route.subject.to_string(),
            body,
            chooser_title: Some(CHOOSER_TITLE.to_string()),
        }
    }

    /// Deliver if a client resolves. `Ok(false)` means nothing was sent.
    async fn dispatch(&self, message: EmailMessage) -> Result<bool> {
        if !self.inner.mail.is_available().await {
            warn!(subject = %message.subject, "No email client available");
            return Ok(false);
        }
        self.inner.mail.deliver(&message).await?;
        Ok(true)
    }

    fn email_body(&self, category: FeedbackCategory, prefilled_message: &str) -> String {
        let info = SystemInfo::collect(&self.inner.app_version);
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        format!(
            "RiggerConnect Feedback\n\
             Category: {category}\n\
             App Version: {version}\n\
             Device: {device}\n\
             OS Version: {os}\n\
             Timestamp: {timestamp}\n\
             \n\
             Message:\n\
             {prefilled_message}\n\
             \n\
             Additional details:\n\
             (Please describe your feedback, issue, or suggestion here)\n",
            category = category.words(),
            version = self.inner.app_version,
            device = info.device_model,
            os = info.os_version,
        )
    }
}

/// `RiggerConnect Feedback - <Category words>`.
#[must_use]
pub fn email_subject(category: FeedbackCategory) -> String {
    let words = category.words();
    let mut chars = words.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    format!("RiggerConnect Feedback - {capitalized}")
}

fn spawn_detached<F>(what: &'static str, task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
        }
        Err(_) => warn!("No async runtime; {what} submission dropped"),
    }
}

fn error_details(error_message: &str, stack_trace: Option<&str>) -> BTreeMap<String, String> {
    let mut details = BTreeMap::from([
        ("error_message".to_string(), error_message.to_string()),
        ("auto_generated".to_string(), "true".to_string()),
        (
            "timestamp".to_string(),
            Utc::now().timestamp_millis().to_string(),
        ),
    ]);
    if let Some(stack) = stack_trace {
        details.insert("stack_trace".to_string(), stack.to_string());
    }
    details
}
