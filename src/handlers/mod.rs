//! NATS message handlers

pub mod dashboard;
pub mod ping;
pub mod reminders;
pub mod service;
pub mod vehicle;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::select;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{MaintenanceRepository, RepositoryError};
use crate::handlers::reminders::TriggerContext;
use crate::types::{ErrorResponse, Request, SuccessResponse};

pub const SUBJECT_PING: &str = "autotrack.ping";
pub const SUBJECT_REMINDERS_TRIGGER: &str = "autotrack.reminders.trigger";
pub const SUBJECT_DASHBOARD_GET: &str = "autotrack.dashboard.get";
pub const SUBJECT_TIMELINE_GET: &str = "autotrack.timeline.get";
pub const SUBJECT_VEHICLE_CREATE: &str = "autotrack.vehicle.create";
pub const SUBJECT_VEHICLE_MILEAGE_UPDATE: &str = "autotrack.vehicle.mileage.update";
pub const SUBJECT_SERVICE_LOG: &str = "autotrack.service.log";
pub const SUBJECT_SCHEDULE_DUE_DATE_UPDATE: &str = "autotrack.schedule.due_date.update";

/// Worker replicas share one queue group so each request reaches one of them
pub const QUEUE_GROUP: &str = "autotrack-workers";

/// Error reply of a handler: wire code plus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    pub code: &'static str,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new("INVALID_REQUEST", message)
    }
}

impl From<RepositoryError> for HandlerError {
    fn from(err: RepositoryError) -> Self {
        let code = match &err {
            RepositoryError::NotFound { .. } => "NOT_FOUND",
            RepositoryError::Invalid(_) => "INVALID_REQUEST",
            RepositoryError::Unavailable(_) => "UNAVAILABLE",
            RepositoryError::Database(_) => "DATABASE_ERROR",
        };
        Self::new(code, err.to_string())
    }
}

/// Request/reply loop shared by all handlers.
///
/// Parses `Request<T>`, runs `process` and publishes either a
/// `SuccessResponse` or an `ErrorResponse` to the reply subject.
pub async fn serve<T, R, F, Fut>(
    client: Client,
    mut subscriber: Subscriber,
    subject: &'static str,
    process: F,
) -> Result<()>
where
    T: DeserializeOwned,
    R: Serialize,
    F: Fn(Request<T>) -> Fut,
    Fut: Future<Output = std::result::Result<R, HandlerError>>,
{
    while let Some(msg) = subscriber.next().await {
        debug!("Received {} message", subject);

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("{} message without reply subject", subject);
                continue;
            }
        };

        let request: Request<T> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse {} request: {}", subject, e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let request_id = request.id;
        match process(request).await {
            Ok(payload) => {
                let response = SuccessResponse::new(request_id, payload);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("{} failed: {} {}", subject, e.code, e.message);
                let error = ErrorResponse::new(request_id, e.code, e.message);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Start all message handlers
pub async fn start_handlers(
    client: Client,
    repo: Arc<dyn MaintenanceRepository>,
    trigger: Arc<TriggerContext>,
) -> Result<()> {
    info!("Starting message handlers...");

    let ping_sub = client.queue_subscribe(SUBJECT_PING, QUEUE_GROUP.into()).await?;
    let trigger_sub = client.queue_subscribe(SUBJECT_REMINDERS_TRIGGER, QUEUE_GROUP.into()).await?;
    let dashboard_sub = client.queue_subscribe(SUBJECT_DASHBOARD_GET, QUEUE_GROUP.into()).await?;
    let timeline_sub = client.queue_subscribe(SUBJECT_TIMELINE_GET, QUEUE_GROUP.into()).await?;
    let vehicle_create_sub = client.queue_subscribe(SUBJECT_VEHICLE_CREATE, QUEUE_GROUP.into()).await?;
    let mileage_update_sub = client.queue_subscribe(SUBJECT_VEHICLE_MILEAGE_UPDATE, QUEUE_GROUP.into()).await?;
    let service_log_sub = client.queue_subscribe(SUBJECT_SERVICE_LOG, QUEUE_GROUP.into()).await?;
    let due_date_sub = client.queue_subscribe(SUBJECT_SCHEDULE_DUE_DATE_UPDATE, QUEUE_GROUP.into()).await?;

    info!(queue_group = QUEUE_GROUP, "Subscribed to NATS subjects");

    let ping_handle = tokio::spawn(ping::handle_ping(client.clone(), ping_sub));
    let trigger_handle = tokio::spawn(reminders::handle_trigger(client.clone(), trigger_sub, trigger));
    let dashboard_handle = tokio::spawn(dashboard::handle_dashboard(client.clone(), dashboard_sub, repo.clone()));
    let timeline_handle = tokio::spawn(dashboard::handle_timeline(client.clone(), timeline_sub, repo.clone()));
    let vehicle_create_handle = tokio::spawn(vehicle::handle_create(client.clone(), vehicle_create_sub, repo.clone()));
    let mileage_update_handle =
        tokio::spawn(vehicle::handle_update_mileage(client.clone(), mileage_update_sub, repo.clone()));
    let service_log_handle = tokio::spawn(service::handle_log(client.clone(), service_log_sub, repo.clone()));
    let due_date_handle = tokio::spawn(service::handle_update_due_date(client.clone(), due_date_sub, repo));

    info!("All handlers started");

    // Wait for any handler to finish (which would indicate an error)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = trigger_handle => {
            error!("Reminder trigger handler finished: {:?}", result);
        }
        result = dashboard_handle => {
            error!("Dashboard handler finished: {:?}", result);
        }
        result = timeline_handle => {
            error!("Timeline handler finished: {:?}", result);
        }
        result = vehicle_create_handle => {
            error!("Vehicle create handler finished: {:?}", result);
        }
        result = mileage_update_handle => {
            error!("Mileage update handler finished: {:?}", result);
        }
        result = service_log_handle => {
            error!("Service log handler finished: {:?}", result);
        }
        result = due_date_handle => {
            error!("Due date update handler finished: {:?}", result);
        }
    }

    Ok(())
}
