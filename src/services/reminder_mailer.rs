//! Reminder mailer: renders reminder emails and hands them to an `EmailSender`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use crate::services::due_status::UpcomingService;
use crate::services::email_sender::EmailSender;
use crate::services::email_templates::{MileageReminderEmail, ScheduleReminderEmail};
use crate::types::Vehicle;

pub use crate::services::email_sender::MailerError;

/// Mail collaborator of the reminder dispatcher. Both calls return the delivery id.
#[async_trait]
pub trait ReminderMailer: Send + Sync {
    async fn send_schedule_reminder(
        &self,
        recipient: &str,
        vehicle: &Vehicle,
        service: &UpcomingService,
        context_url: Option<&str>,
    ) -> Result<String, MailerError>;

    async fn send_mileage_reminder(
        &self,
        recipient: &str,
        vehicle: &Vehicle,
        context_url: Option<&str>,
    ) -> Result<String, MailerError>;
}

/// Resolve `path` against the app base URL; an unusable base yields no link.
pub fn context_url(base: &str, path: &str) -> Option<String> {
    Url::parse(base)
        .and_then(|url| url.join(path))
        .map(String::from)
        .ok()
}

pub struct EmailReminderMailer {
    sender: Arc<dyn EmailSender>,
}

impl EmailReminderMailer {
    pub fn new(sender: Arc<dyn EmailSender>) -> Self {
        Self { sender }
    }
}

fn into_mailer_error(err: anyhow::Error) -> MailerError {
    match err.downcast::<MailerError>() {
        Ok(typed) => typed,
        Err(other) => MailerError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ReminderMailer for EmailReminderMailer {
    async fn send_schedule_reminder(
        &self,
        recipient: &str,
        vehicle: &Vehicle,
        service: &UpcomingService,
        context_url: Option<&str>,
    ) -> Result<String, MailerError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(MailerError::MissingRecipient);
        }

        let message = ScheduleReminderEmail {
            to: recipient,
            vehicle,
            service,
            action_url: context_url,
        }
        .render();

        self.sender.send(message).await.map_err(into_mailer_error)
    }

    async fn send_mileage_reminder(
        &self,
        recipient: &str,
        vehicle: &Vehicle,
        context_url: Option<&str>,
    ) -> Result<String, MailerError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(MailerError::MissingRecipient);
        }

        let message = MileageReminderEmail {
            to: recipient,
            vehicle,
            action_url: context_url,
        }
        .render();

        self.sender.send(message).await.map_err(into_mailer_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email_sender::FakeEmailSender;
    use crate::types::StoredTimestamp;
    use uuid::Uuid;

    fn vehicle() -> Vehicle {
        Vehicle {
            id: Uuid::nil(),
            device_id: "device-gamma".into(),
            year: Some(2015),
            make: "Honda".into(),
            model: "CR-V".into(),
            vin: None,
            contact_email: Some("nina.fernandez@example.com".into()),
            current_mileage: Some(98_210),
            last_mileage_confirmed_at: None,
            last_mileage_reminder_at: None,
            created_at: StoredTimestamp::new("2021-01-20T16:40:00.000Z"),
            updated_at: StoredTimestamp::new("2021-01-20T16:40:00.000Z"),
        }
    }

    #[test]
    fn context_url_joins_path() {
        assert_eq!(
            context_url("https://autotrack.example.com/app/", "/vehicle/mileage").as_deref(),
            Some("https://autotrack.example.com/vehicle/mileage")
        );
        assert_eq!(context_url("not a url", "/service/new"), None);
    }

    #[tokio::test]
    async fn mileage_reminder_returns_delivery_id() {
        let sender = Arc::new(FakeEmailSender::new());
        let mailer = EmailReminderMailer::new(sender.clone());

        let id = mailer
            .send_mileage_reminder("nina.fernandez@example.com", &vehicle(), None)
            .await
            .unwrap();

        assert_eq!(id, "fake-1");
        assert_eq!(sender.last_message().unwrap().subject, "AutoTrack reminder: Update your mileage");
    }

    #[tokio::test]
    async fn blank_recipient_is_rejected_before_sending() {
        let sender = Arc::new(FakeEmailSender::new());
        let mailer = EmailReminderMailer::new(sender.clone());

        let err = mailer.send_mileage_reminder("  ", &vehicle(), None).await.unwrap_err();
        assert!(matches!(err, MailerError::MissingRecipient));
        assert!(sender.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn transport_errors_keep_their_type() {
        let sender = Arc::new(FakeEmailSender::new());
        sender.fail_for("nina.fernandez@example.com");
        let mailer = EmailReminderMailer::new(sender);

        let err = mailer
            .send_mileage_reminder("nina.fernandez@example.com", &vehicle(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Transport(_)));
    }
}
