//! Outbound email messages and the clients that deliver them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How the message should be handed to the user's mail client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailAction {
    /// Send a prepared message, letting the user pick a client.
    Send,
    /// Open a compose window for the user to finish.
    Compose,
}

/// A message ready for a mail client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Send or compose.
    pub action: EmailAction,
    /// Destination addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Title for a client chooser, if one is shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chooser_title: Option<String>,
}

impl EmailMessage {
    /// Render as a `mailto:` URI with an encoded subject and body.
    #[must_use]
    pub fn to_mailto_uri(&self) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            self.recipients.join(","),
            urlencoding::encode(&self.subject),
            urlencoding::encode(&self.body)
        )
    }
}

/// Something that can take an [`EmailMessage`] off our hands.
#[async_trait]
pub trait MailClient: Send + Sync + std::fmt::Debug {
    /// Whether a client can be resolved right now.
    async fn is_available(&self) -> bool;

    /// Hand the message over.
    ///
    /// # Errors
    ///
    /// Returns an error if the client rejects or cannot store the message.
    async fn deliver(&self, message: &EmailMessage) -> Result<()>;
}

/// Spools messages as JSON files for a separate sender to pick up.
#[derive(Debug)]
pub struct OutboxMailClient {
    dir: PathBuf,
    seq: AtomicU64,
}

impl OutboxMailClient {
    /// Spool into `dir`, created on first delivery.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    /// The outbox directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Messages currently waiting in the outbox, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbox directory cannot be listed. Files that
    /// cannot be read or parsed are skipped with a warning.
    pub async fn pending(&self) -> Result<Vec<EmailMessage>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                names.push(path);
            }
        }
        names.sort();

        let mut messages = Vec::with_capacity(names.len());
        for path in names {
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), "Skipping unreadable outbox file: {e}");
                    continue;
                }
            };
            match serde_json::from_slice(&raw) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(path = %path.display(), "Skipping malformed outbox file: {e}"),
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl MailClient for OutboxMailClient {
    async fn is_available(&self) -> bool {
        !self.dir.as_os_str().is_empty()
    }

    async fn deliver(&self, message: &EmailMessage) -> Result<()> {
        if !self.is_available().await {
            return Err(Error::MailUnavailable);
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| Error::DirectoryCreate {
                path: self.dir.clone(),
                source,
            })?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{}-{seq:04}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
            std::process::id()
        );
        let path = self.dir.join(name);
        let body = serde_json::to_vec_pretty(message)?;

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::mail_delivery(&message.subject, e.to_string()))?;

        debug!(path = %path.display(), subject = %message.subject, "Spooled email to outbox");
        Ok(())
    }
}

/// A client that never resolves.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableMailClient;

#[async_trait]
impl MailClient for UnavailableMailClient {
    async fn is_available(&self) -> bool {
        false
    }

    async fn deliver(&self, _message: &EmailMessage) -> Result<()> {
        Err(Error::MailUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn message(subject: &str) -> EmailMessage {
        EmailMessage {
            action: EmailAction::Send,
            recipients: vec!["support@riggerconnect.com".to_string()],
            subject: subject.to_string(),
            body: "{\"k\":1}".to_string(),
            chooser_title: Some("Send Feedback".to_string()),
        }
    }

    #[test]
    fn test_mailto_uri_encodes_subject_and_body() {
        let msg = EmailMessage {
            action: EmailAction::Compose,
            recipients: vec!["a@x.com".to_string(), "b@y.com".to_string()],
            subject: "URGENT: Safety Concern".to_string(),
            body: "line one\nline & two".to_string(),
            chooser_title: None,
        };

        assert_eq!(
            msg.to_mailto_uri(),
            "mailto:a@x.com,b@y.com?subject=URGENT%3A%20Safety%20Concern\
             &body=line%20one%0Aline%20%26%20two"
        );
    }

    #[tokio::test]
    async fn test_outbox_delivers_json_files() {
        let temp = TempDir::new().unwrap();
        let client = OutboxMailClient::new(temp.path().join("outbox"));
        assert!(client.is_available().await);
        assert!(client.pending().await.unwrap().is_empty());

        client.deliver(&message("first")).await.unwrap();
        client.deliver(&message("second")).await.unwrap();

        let pending = client.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].subject, "first");
        assert_eq!(pending[1], message("second"));
    }

    #[tokio::test]
    async fn test_pending_skips_malformed_files() {
        let temp = TempDir::new().unwrap();
        let client = OutboxMailClient::new(temp.path());
        client.deliver(&message("good")).await.unwrap();
        std::fs::write(temp.path().join("0000-broken.json"), "{not json").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let pending = client.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].subject, "good");
    }

    #[tokio::test]
    async fn test_outbox_without_directory_is_unavailable() {
        let client = OutboxMailClient::new("");
        assert!(!client.is_available().await);
        assert!(client
            .deliver(&message("x"))
            .await
            .unwrap_err()
            .is_mail_unavailable());
    }

    #[tokio::test]
    async fn test_unavailable_client() {
        let client = UnavailableMailClient;
        assert!(!client.is_available().await);
        assert!(matches!(
            client.deliver(&message("x")).await,
            Err(Error::MailUnavailable)
        ));
    }
}
