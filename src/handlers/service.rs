//! Service log and schedule adjustment handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::{MaintenanceRepository, RepositoryError};
use crate::handlers::{serve, HandlerError, SUBJECT_SCHEDULE_DUE_DATE_UPDATE, SUBJECT_SERVICE_LOG};
use crate::types::{LogServiceRequest, Request, ServiceLog, ServiceSchedule, UpdateDueDateRequest};

/// Log a completed service. With a schedule id the schedule rolls forward;
/// without one a custom name is required.
pub async fn process_log(
    repo: &dyn MaintenanceRepository,
    request: &LogServiceRequest,
    now: DateTime<Utc>,
) -> std::result::Result<ServiceLog, HandlerError> {
    if request.mileage.is_some_and(|m| m < 0) {
        return Err(HandlerError::invalid("mileage must be non-negative"));
    }
    let service = request.completed_service();

    let log = match request.schedule_id {
        Some(schedule_id) => {
            let schedule = repo
                .get_schedule(schedule_id)
                .await?
                .ok_or(RepositoryError::NotFound { entity: "schedule", id: schedule_id })?;
            if schedule.vehicle_id != request.vehicle_id {
                return Err(HandlerError::invalid("schedule does not belong to this vehicle"));
            }
            repo.record_completed_service(schedule_id, &service, now).await?
        }
        None => {
            let name = request
                .custom_service_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| HandlerError::invalid("customServiceName is required without scheduleId"))?;
            repo.record_custom_service(request.vehicle_id, name, &service, now).await?
        }
    };

    info!(
        vehicle_id = %log.vehicle_id,
        log_id = %log.id,
        service = %log.service_name,
        "Service logged"
    );
    Ok(log)
}

pub async fn process_update_due_date(
    repo: &dyn MaintenanceRepository,
    request: &UpdateDueDateRequest,
    now: DateTime<Utc>,
) -> std::result::Result<ServiceSchedule, HandlerError> {
    let schedule = repo
        .update_schedule_due_date(request.schedule_id, request.next_due_date, now)
        .await?;

    info!(schedule_id = %schedule.id, due = %request.next_due_date, "Schedule due date moved");
    Ok(schedule)
}

/// Handle service.log messages
pub async fn handle_log(
    client: Client,
    subscriber: Subscriber,
    repo: Arc<dyn MaintenanceRepository>,
) -> Result<()> {
    serve(client, subscriber, SUBJECT_SERVICE_LOG, move |request: Request<LogServiceRequest>| {
        let repo = repo.clone();
        async move { process_log(repo.as_ref(), &request.payload, Utc::now()).await }
    })
    .await
}

/// Handle schedule.due_date.update messages
pub async fn handle_update_due_date(
    client: Client,
    subscriber: Subscriber,
    repo: Arc<dyn MaintenanceRepository>,
) -> Result<()> {
    serve(
        client,
        subscriber,
        SUBJECT_SCHEDULE_DUE_DATE_UPDATE,
        move |request: Request<UpdateDueDateRequest>| {
            let repo = repo.clone();
            async move { process_update_due_date(repo.as_ref(), &request.payload, Utc::now()).await }
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{
        MemoryRepository, SEED_ALPHA_OIL, SEED_ALPHA_VEHICLE, SEED_BETA_VEHICLE, SEED_GAMMA_CABIN,
    };
    use crate::types::StoredDate;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap()
    }

    fn log_request(vehicle_id: uuid::Uuid, schedule_id: Option<uuid::Uuid>, name: Option<&str>) -> LogServiceRequest {
        LogServiceRequest {
            vehicle_id,
            schedule_id,
            custom_service_name: name.map(str::to_string),
            service_date: NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
            mileage: Some(46_000),
            cost: Some(89.99),
            notes: Some("Full synthetic".into()),
        }
    }

    #[tokio::test]
    async fn scheduled_service_rolls_schedule_forward() {
        let repo = MemoryRepository::seeded();

        let log = process_log(&repo, &log_request(SEED_ALPHA_VEHICLE, Some(SEED_ALPHA_OIL), None), now())
            .await
            .unwrap();

        assert_eq!(log.schedule_id, Some(SEED_ALPHA_OIL));
        assert_eq!(log.service_name, "Engine Oil & Filter");
        assert_eq!(log.cost_cents, Some(8_999));

        let oil = repo.get_schedule(SEED_ALPHA_OIL).await.unwrap().unwrap();
        assert_eq!(oil.next_due_date, Some(StoredDate::new("2024-12-20")));
        assert_eq!(oil.next_due_mileage, Some(51_000));
        assert!(oil.last_reminder_sent_at.is_none());

        let vehicle = repo.get_vehicle(SEED_ALPHA_VEHICLE).await.unwrap().unwrap();
        assert_eq!(vehicle.current_mileage, Some(46_000));
    }

    #[tokio::test]
    async fn custom_service_needs_a_name() {
        let repo = MemoryRepository::seeded();

        let err = process_log(&repo, &log_request(SEED_BETA_VEHICLE, None, Some("  ")), now())
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");

        let log = process_log(&repo, &log_request(SEED_BETA_VEHICLE, None, Some("Roof Rack Install")), now())
            .await
            .unwrap();
        assert!(log.schedule_id.is_none());
        assert_eq!(log.service_name, "Roof Rack Install");
    }

    #[tokio::test]
    async fn schedule_of_another_vehicle_is_rejected() {
        let repo = MemoryRepository::seeded();

        let err = process_log(&repo, &log_request(SEED_ALPHA_VEHICLE, Some(SEED_GAMMA_CABIN), None), now())
            .await
            .unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");

        let cabin = repo.get_schedule(SEED_GAMMA_CABIN).await.unwrap().unwrap();
        assert_eq!(cabin.next_due_date, Some(StoredDate::new("2024-03-01")));
    }

    #[tokio::test]
    async fn due_date_update_moves_schedule() {
        let repo = MemoryRepository::seeded();
        let request = UpdateDueDateRequest {
            schedule_id: SEED_GAMMA_CABIN,
            next_due_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        };

        let schedule = process_update_due_date(&repo, &request, now()).await.unwrap();
        assert_eq!(schedule.next_due_date, Some(StoredDate::new("2024-09-01")));
    }

    #[tokio::test]
    async fn due_date_update_for_unknown_schedule() {
        let repo = MemoryRepository::seeded();
        let request = UpdateDueDateRequest {
            schedule_id: uuid::Uuid::new_v4(),
            next_due_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        };

        let err = process_update_due_date(&repo, &request, now()).await.unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }
}
