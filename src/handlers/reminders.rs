//! Reminder trigger handler: authenticated entry point for the periodic job

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, EmailTransport};
use crate::db::MaintenanceRepository;
use crate::handlers::{serve, HandlerError, SUBJECT_REMINDERS_TRIGGER};
use crate::services::email_sender::{EmailSender, LogEmailSender, ResendEmailSender};
use crate::services::reminder_dispatch::ReminderDispatcher;
use crate::services::reminder_mailer::EmailReminderMailer;
use crate::types::{EmptyPayload, ErrorResponse, ReminderRunReport, Request, SuccessResponse};

/// Everything the trigger needs. Missing email configuration is kept as a
/// reason string so the worker still starts and the trigger reports it.
pub struct TriggerContext {
    cron_secret: Option<String>,
    dispatcher: std::result::Result<Arc<ReminderDispatcher>, String>,
    shutdown: CancellationToken,
}

impl TriggerContext {
    pub fn new(
        cron_secret: Option<String>,
        dispatcher: std::result::Result<Arc<ReminderDispatcher>, String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { cron_secret, dispatcher, shutdown }
    }

    pub fn from_config(
        config: &Config,
        repo: Arc<dyn MaintenanceRepository>,
        shutdown: CancellationToken,
    ) -> Self {
        let dispatcher = build_sender(config).map(|sender| {
            let mailer = Arc::new(EmailReminderMailer::new(sender));
            Arc::new(ReminderDispatcher::new(
                repo,
                mailer,
                config.reminders.clone(),
                config.app_base_url.clone(),
            ))
        });

        if let Err(reason) = &dispatcher {
            warn!("Reminder email disabled: {}", reason);
        }

        Self::new(config.reminder_cron_secret.clone(), dispatcher, shutdown)
    }
}

fn build_sender(config: &Config) -> std::result::Result<Arc<dyn EmailSender>, String> {
    let from = config
        .reminder_from_email
        .clone()
        .ok_or_else(|| "REMINDER_FROM_EMAIL is not configured".to_string())?;

    match &config.email_transport {
        EmailTransport::Resend { api_key } => Ok(Arc::new(ResendEmailSender::new(api_key.clone(), from))),
        EmailTransport::Log => {
            warn!("EMAIL_TRANSPORT=log: reminder emails are logged, not delivered");
            Ok(Arc::new(LogEmailSender))
        }
        EmailTransport::Unconfigured => Err("RESEND_API_KEY is not configured".to_string()),
    }
}

/// Compare digests so the check does not short-circuit on the first differing byte.
fn token_matches(presented: Option<&str>, secret: &str) -> bool {
    let Some(token) = presented else {
        return false;
    };
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    Sha256::digest(token.as_bytes()) == Sha256::digest(secret.as_bytes())
}

pub async fn process_trigger(
    ctx: &TriggerContext,
    request: &Request<EmptyPayload>,
    now: DateTime<Utc>,
) -> std::result::Result<ReminderRunReport, HandlerError> {
    let secret = ctx
        .cron_secret
        .as_deref()
        .ok_or_else(|| HandlerError::new("CONFIG_ERROR", "REMINDER_CRON_SECRET is not configured"))?;

    if !token_matches(request.token.as_deref(), secret) {
        warn!(request_id = %request.id, "Reminder trigger rejected: bad token");
        return Err(HandlerError::new("UNAUTHORIZED", "Invalid cron secret"));
    }

    let dispatcher = ctx
        .dispatcher
        .as_ref()
        .map_err(|reason| HandlerError::new("CONFIG_ERROR", reason.clone()))?;

    info!(request_id = %request.id, "Reminder run triggered");

    dispatcher
        .run(now, &ctx.shutdown.child_token())
        .await
        .map_err(|e| HandlerError::new("DISPATCH_ERROR", e.to_string()))
}

/// Handle reminder trigger messages
pub async fn handle_trigger(client: Client, subscriber: Subscriber, ctx: Arc<TriggerContext>) -> Result<()> {
    serve(client, subscriber, SUBJECT_REMINDERS_TRIGGER, move |request: Request<EmptyPayload>| {
        let ctx = ctx.clone();
        async move { process_trigger(&ctx, &request, Utc::now()).await }
    })
    .await
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum TriggerReply {
    Failed(ErrorResponse),
    Done(SuccessResponse<ReminderRunReport>),
}

fn decode_trigger_reply(bytes: &[u8]) -> Result<ReminderRunReport> {
    match serde_json::from_slice::<TriggerReply>(bytes).context("Malformed reminder trigger reply")? {
        TriggerReply::Done(reply) => Ok(reply.payload),
        TriggerReply::Failed(reply) => {
            anyhow::bail!("Reminder trigger failed: {} {}", reply.error.code, reply.error.message)
        }
    }
}

/// Send one authenticated trigger request and wait for the run report.
pub async fn request_run(client: &Client, secret: &str, timeout: Duration) -> Result<ReminderRunReport> {
    let request = Request::with_token(secret.to_string(), EmptyPayload {});
    let body = serde_json::to_vec(&request)?;

    let reply = tokio::time::timeout(timeout, client.request(SUBJECT_REMINDERS_TRIGGER, body.into()))
        .await
        .with_context(|| format!("Reminder trigger timed out after {} ms", timeout.as_millis()))?
        .context("Reminder trigger request failed")?;

    decode_trigger_reply(&reply.payload)
}
