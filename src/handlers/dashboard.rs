//! Dashboard and timeline handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::{MaintenanceRepository, RepositoryError};
use crate::defaults::default_service_templates;
use crate::handlers::{serve, HandlerError, SUBJECT_DASHBOARD_GET, SUBJECT_TIMELINE_GET};
use crate::services::due_status::{evaluate_schedules, UpcomingService};
use crate::services::labels::{reminder_preview_date, reminder_summary};
use crate::services::next_service::pick_next_service;
use crate::services::timeline::{build_timeline, last_service, TimelineEntry};
use crate::types::{Request, ServiceLog, Vehicle, VehicleIdRequest};

/// Evaluated service with its presentation strings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingServiceView {
    #[serde(flatten)]
    pub service: UpcomingService,
    pub summary: Option<String>,
    pub reminder_preview_date: Option<String>,
}

impl From<&UpcomingService> for UpcomingServiceView {
    fn from(service: &UpcomingService) -> Self {
        Self {
            summary: reminder_summary(service),
            reminder_preview_date: reminder_preview_date(service),
            service: service.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub vehicle: Vehicle,
    pub upcoming: Vec<UpcomingServiceView>,
    pub next_service: Option<UpcomingServiceView>,
    pub last_service: Option<ServiceLog>,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    pub vehicle_id: Uuid,
    pub entries: Vec<TimelineEntry>,
}

/// Vehicle plus evaluated schedules and history, backfilling schedules on first read.
async fn load_vehicle_state(
    repo: &dyn MaintenanceRepository,
    vehicle_id: Uuid,
    now: DateTime<Utc>,
) -> std::result::Result<(Vehicle, Vec<UpcomingService>, Vec<ServiceLog>), HandlerError> {
    let vehicle = repo
        .get_vehicle(vehicle_id)
        .await?
        .ok_or(RepositoryError::NotFound { entity: "vehicle", id: vehicle_id })?;

    if repo
        .ensure_schedules_exist(&vehicle, &default_service_templates(), now)
        .await?
    {
        info!(vehicle_id = %vehicle_id, "Backfilled default maintenance schedules");
    }

    let schedules = repo.list_schedules_for_vehicle(vehicle_id).await?;
    let logs = repo.list_service_logs(vehicle_id).await?;
    let upcoming = evaluate_schedules(&schedules, &vehicle, now);

    Ok((vehicle, upcoming, logs))
}

pub async fn process_dashboard(
    repo: &dyn MaintenanceRepository,
    request: &VehicleIdRequest,
    now: DateTime<Utc>,
) -> std::result::Result<DashboardResponse, HandlerError> {
    let (vehicle, upcoming, logs) = load_vehicle_state(repo, request.vehicle_id, now).await?;

    Ok(DashboardResponse {
        next_service: pick_next_service(&upcoming).map(UpcomingServiceView::from),
        last_service: last_service(&logs).cloned(),
        timeline: build_timeline(&upcoming, &logs),
        upcoming: upcoming.iter().map(UpcomingServiceView::from).collect(),
        vehicle,
    })
}

pub async fn process_timeline(
    repo: &dyn MaintenanceRepository,
    request: &VehicleIdRequest,
    now: DateTime<Utc>,
) -> std::result::Result<TimelineResponse, HandlerError> {
    let (vehicle, upcoming, logs) = load_vehicle_state(repo, request.vehicle_id, now).await?;

    Ok(TimelineResponse {
        vehicle_id: vehicle.id,
        entries: build_timeline(&upcoming, &logs),
    })
}

/// Handle dashboard requests
pub async fn handle_dashboard(
    client: Client,
    subscriber: Subscriber,
    repo: Arc<dyn MaintenanceRepository>,
) -> Result<()> {
    serve(client, subscriber, SUBJECT_DASHBOARD_GET, move |request: Request<VehicleIdRequest>| {
        let repo = repo.clone();
        async move { process_dashboard(repo.as_ref(), &request.payload, Utc::now()).await }
    })
    .await
}

/// Handle timeline requests
pub async fn handle_timeline(
    client: Client,
    subscriber: Subscriber,
    repo: Arc<dyn MaintenanceRepository>,
) -> Result<()> {
    serve(client, subscriber, SUBJECT_TIMELINE_GET, move |request: Request<VehicleIdRequest>| {
        let repo = repo.clone();
        async move { process_timeline(repo.as_ref(), &request.payload, Utc::now()).await }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryRepository, SEED_ALPHA_OIL, SEED_ALPHA_VEHICLE};
    use crate::types::{MaintenanceStatus, StoredTimestamp};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn dashboard_for_seeded_vehicle() {
        let repo = MemoryRepository::seeded();

        let dashboard = process_dashboard(&repo, &VehicleIdRequest { vehicle_id: SEED_ALPHA_VEHICLE }, now())
            .await
            .unwrap();

        assert_eq!(dashboard.vehicle.label(), "2018 Toyota Camry");
        assert_eq!(dashboard.upcoming.len(), 2);

        let next = dashboard.next_service.unwrap();
        assert_eq!(next.service.schedule.id, SEED_ALPHA_OIL);
        assert_eq!(next.service.status, MaintenanceStatus::DueSoon);
        assert_eq!(next.summary.as_deref(), Some("Due in 11 days • 4,790 miles remaining"));
        assert_eq!(next.reminder_preview_date.as_deref(), Some("Jun 17, 2024"));

        assert_eq!(dashboard.last_service.unwrap().service_name, "Tire Rotation");
        assert_eq!(dashboard.timeline.len(), 4);
    }

    #[tokio::test]
    async fn dashboard_backfills_vehicle_without_schedules() {
        let repo = MemoryRepository::new();
        let vehicle_id = Uuid::new_v4();
        repo.insert_vehicle(Vehicle {
            id: vehicle_id,
            device_id: "device-delta".into(),
            year: Some(2020),
            make: "Subaru".into(),
            model: "Outback".into(),
            vin: None,
            contact_email: None,
            current_mileage: Some(30_000),
            last_mileage_confirmed_at: None,
            last_mileage_reminder_at: None,
            created_at: StoredTimestamp::new("2024-01-01T00:00:00.000Z"),
            updated_at: StoredTimestamp::new("2024-01-01T00:00:00.000Z"),
        });

        let dashboard = process_dashboard(&repo, &VehicleIdRequest { vehicle_id }, now())
            .await
            .unwrap();
        assert_eq!(dashboard.upcoming.len(), default_service_templates().len());
        assert!(dashboard.last_service.is_none());

        // second read does not materialize again
        let again = process_dashboard(&repo, &VehicleIdRequest { vehicle_id }, now())
            .await
            .unwrap();
        assert_eq!(again.upcoming.len(), dashboard.upcoming.len());
    }

    #[tokio::test]
    async fn unknown_vehicle_is_not_found() {
        let repo = MemoryRepository::seeded();

        let err = process_timeline(&repo, &VehicleIdRequest { vehicle_id: Uuid::new_v4() }, now())
            .await
            .unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn timeline_lists_upcoming_then_completed() {
        let repo = MemoryRepository::seeded();

        let timeline = process_timeline(&repo, &VehicleIdRequest { vehicle_id: SEED_ALPHA_VEHICLE }, now())
            .await
            .unwrap();

        assert_eq!(timeline.vehicle_id, SEED_ALPHA_VEHICLE);
        assert!(matches!(timeline.entries[0], TimelineEntry::Upcoming { .. }));
        assert!(matches!(timeline.entries[1], TimelineEntry::Upcoming { .. }));
        assert!(matches!(timeline.entries[2], TimelineEntry::Completed { .. }));
    }

    #[tokio::test]
    async fn dashboard_serializes_flattened_service() {
        let repo = MemoryRepository::seeded();
        let dashboard = process_dashboard(&repo, &VehicleIdRequest { vehicle_id: SEED_ALPHA_VEHICLE }, now())
            .await
            .unwrap();

        let json = serde_json::to_value(&dashboard).unwrap();
        let next = &json["nextService"];
        assert_eq!(next["status"], "due_soon");
        assert_eq!(next["daysUntilDue"], 11);
        assert!(next["summary"].is_string());
    }
}
