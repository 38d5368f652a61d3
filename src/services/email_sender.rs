//! Transactional email sending abstraction.
//!
//! `EmailSender` is the transport seam. `ResendEmailSender` delivers through
//! the Resend API, `LogEmailSender` writes rendered mail to tracing for local
//! runs, and `FakeEmailSender` records messages for tests.
//!
//! Every successful send yields the transport's delivery id.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

// =============================================================================
// Core trait
// =============================================================================

/// A rendered email message ready to send.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivery failure surfaced into reminder run reports.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Missing recipient email address.")]
    MissingRecipient,

    #[error("email transport failed: {0}")]
    Transport(String),

    #[error("email rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Abstraction over an email transport.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send a message and return the delivery id.
    async fn send(&self, msg: EmailMessage) -> Result<String>;
}

// =============================================================================
// LogEmailSender: writes to tracing (local runs)
// =============================================================================

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<String> {
        let delivery_id = format!("log-{}", Uuid::new_v4());
        info!(
            to = %msg.to,
            subject = %msg.subject,
            delivery_id = %delivery_id,
            "[LogEmailSender] Would send email\n---TEXT---\n{}",
            msg.text,
        );
        Ok(delivery_id)
    }
}

// =============================================================================
// FakeEmailSender: captures sent messages (tests)
// =============================================================================

/// Collects sent messages in memory. Recipients marked with
/// [`FakeEmailSender::fail_for`] get a transport error instead.
#[derive(Default)]
pub struct FakeEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<HashSet<String>>,
    counter: AtomicU64,
}

impl FakeEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().insert(recipient.to_string());
    }

    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    pub fn last_message(&self) -> Option<EmailMessage> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl EmailSender for FakeEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<String> {
        if self.failing.lock().contains(&msg.to) {
            return Err(MailerError::Transport(format!("connection reset while sending to {}", msg.to)).into());
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().push(msg);
        Ok(format!("fake-{}", n))
    }
}

// =============================================================================
// ResendEmailSender: live Resend.com API
// =============================================================================

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

pub struct ResendEmailSender {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendEmailSender {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, msg: EmailMessage) -> Result<String> {
        let mut body = HashMap::new();
        body.insert("from", self.from.as_str());
        body.insert("to", msg.to.as_str());
        body.insert("subject", msg.subject.as_str());
        body.insert("html", msg.html.as_str());
        body.insert("text", msg.text.as_str());

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected { status, body }.into());
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| MailerError::Transport(format!("unreadable Resend response: {}", e)))?;

        info!(to = %msg.to, subject = %msg.subject, delivery_id = %parsed.id, "Email sent via Resend");
        Ok(parsed.id)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "AutoTrack reminder: Oil Change".into(),
            html: "<p>Due soon</p>".into(),
            text: "Due soon".into(),
        }
    }

    #[tokio::test]
    async fn fake_sender_captures_messages() {
        let sender = FakeEmailSender::new();
        let id = sender.send(message("alex.tan@example.com")).await.unwrap();

        assert_eq!(id, "fake-1");
        let msgs = sender.sent_messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].to, "alex.tan@example.com");
        assert_eq!(msgs[0].subject, "AutoTrack reminder: Oil Change");
    }

    #[tokio::test]
    async fn fake_sender_numbers_deliveries() {
        let sender = FakeEmailSender::new();
        for i in 0..3 {
            let id = sender.send(message(&format!("user{}@example.com", i))).await.unwrap();
            assert_eq!(id, format!("fake-{}", i + 1));
        }
        assert_eq!(sender.sent_messages().len(), 3);
        assert_eq!(sender.last_message().unwrap().to, "user2@example.com");
    }

    #[test]
    fn fake_sender_scripted_failure() {
        let sender = FakeEmailSender::new();
        sender.fail_for("broken@example.com");

        let err = tokio_test::block_on(sender.send(message("broken@example.com"))).unwrap_err();
        assert!(matches!(err.downcast_ref::<MailerError>(), Some(MailerError::Transport(_))));
        assert!(sender.sent_messages().is_empty());
    }

    #[test]
    fn log_sender_returns_delivery_id() {
        let id = tokio_test::block_on(LogEmailSender.send(message("user@example.com"))).unwrap();
        assert!(id.starts_with("log-"));
    }
}
