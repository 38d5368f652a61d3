//! Repository seam consumed by the reminder engine and message handlers.
//!
//! `PgRepository` is the production implementation; `MemoryRepository`
//! (see `db::memory`) backs local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::queries;
use crate::services::recurrence::ServiceTemplate;
use crate::types::{
    CompletedService, CreateVehicleRequest, MaintenanceStatus, ReminderBookkeeping, ServiceLog,
    ServiceSchedule, StoredTimestamp, Vehicle,
};

/// Repository failure. `Unavailable` marks transient storage outages.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::Unavailable(err.to_string())
            }
            other => RepositoryError::Database(other),
        }
    }
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// Storage collaborator for vehicles, schedules and service history.
#[async_trait]
pub trait MaintenanceRepository: Send + Sync {
    /// Vehicles carrying a non-empty reminder contact address.
    async fn list_vehicles_with_contact(&self) -> RepoResult<Vec<Vehicle>>;

    async fn get_vehicle(&self, vehicle_id: Uuid) -> RepoResult<Option<Vehicle>>;

    /// Onboard a vehicle and materialize its schedules from `templates`.
    async fn create_vehicle(
        &self,
        request: &CreateVehicleRequest,
        templates: &[ServiceTemplate],
        now: DateTime<Utc>,
    ) -> RepoResult<Vehicle>;

    async fn list_schedules_for_vehicle(&self, vehicle_id: Uuid) -> RepoResult<Vec<ServiceSchedule>>;

    async fn get_schedule(&self, schedule_id: Uuid) -> RepoResult<Option<ServiceSchedule>>;

    /// Lazy backfill: create schedules from `templates` when the vehicle has
    /// none, using its creation time as reference. Returns whether any were created.
    async fn ensure_schedules_exist(
        &self,
        vehicle: &Vehicle,
        templates: &[ServiceTemplate],
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Service history, newest first.
    async fn list_service_logs(&self, vehicle_id: Uuid) -> RepoResult<Vec<ServiceLog>>;

    /// Append a log for a schedule, roll the schedule forward and raise the
    /// vehicle mileage if the service reports a higher reading.
    async fn record_completed_service(
        &self,
        schedule_id: Uuid,
        service: &CompletedService,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceLog>;

    /// Append an ad-hoc log not tied to any schedule.
    async fn record_custom_service(
        &self,
        vehicle_id: Uuid,
        service_name: &str,
        service: &CompletedService,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceLog>;

    /// Set the odometer to any non-negative value and mark it confirmed.
    async fn update_vehicle_mileage(
        &self,
        vehicle_id: Uuid,
        mileage: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Vehicle>;

    async fn update_schedule_due_date(
        &self,
        schedule_id: Uuid,
        next_due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceSchedule>;

    /// Claim a schedule reminder before mailing: write the new bookkeeping
    /// only if `last_reminder_sent_at` still equals `previous.sent_at`.
    /// Returns `false` when another writer got there first.
    async fn claim_schedule_reminder(
        &self,
        schedule_id: Uuid,
        status: MaintenanceStatus,
        sent_at: DateTime<Utc>,
        previous: &ReminderBookkeeping,
    ) -> RepoResult<bool>;

    /// Restore `previous` after a failed send, unless the claim made at
    /// `claimed_at` has already been overwritten.
    async fn release_schedule_reminder(
        &self,
        schedule_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: &ReminderBookkeeping,
    ) -> RepoResult<()>;

    async fn claim_mileage_reminder(
        &self,
        vehicle_id: Uuid,
        sent_at: DateTime<Utc>,
        previous: Option<&StoredTimestamp>,
    ) -> RepoResult<bool>;

    async fn release_mileage_reminder(
        &self,
        vehicle_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: Option<&StoredTimestamp>,
    ) -> RepoResult<()>;
}

// ==========================================================================
// PostgreSQL implementation
// ==========================================================================

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaintenanceRepository for PgRepository {
    async fn list_vehicles_with_contact(&self) -> RepoResult<Vec<Vehicle>> {
        queries::vehicle::list_vehicles_with_contact(&self.pool).await
    }

    async fn get_vehicle(&self, vehicle_id: Uuid) -> RepoResult<Option<Vehicle>> {
        queries::vehicle::get_vehicle(&self.pool, vehicle_id).await
    }

    async fn create_vehicle(
        &self,
        request: &CreateVehicleRequest,
        templates: &[ServiceTemplate],
        now: DateTime<Utc>,
    ) -> RepoResult<Vehicle> {
        queries::vehicle::create_vehicle(&self.pool, request, templates, now).await
    }

    async fn list_schedules_for_vehicle(&self, vehicle_id: Uuid) -> RepoResult<Vec<ServiceSchedule>> {
        queries::schedule::list_schedules_for_vehicle(&self.pool, vehicle_id).await
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> RepoResult<Option<ServiceSchedule>> {
        queries::schedule::get_schedule(&self.pool, schedule_id).await
    }

    async fn ensure_schedules_exist(
        &self,
        vehicle: &Vehicle,
        templates: &[ServiceTemplate],
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        queries::schedule::ensure_schedules_exist(&self.pool, vehicle, templates, now).await
    }

    async fn list_service_logs(&self, vehicle_id: Uuid) -> RepoResult<Vec<ServiceLog>> {
        queries::service_log::list_service_logs(&self.pool, vehicle_id).await
    }

    async fn record_completed_service(
        &self,
        schedule_id: Uuid,
        service: &CompletedService,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceLog> {
        queries::service_log::record_completed_service(&self.pool, schedule_id, service, now).await
    }

    async fn record_custom_service(
        &self,
        vehicle_id: Uuid,
        service_name: &str,
        service: &CompletedService,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceLog> {
        queries::service_log::record_custom_service(&self.pool, vehicle_id, service_name, service, now).await
    }

    async fn update_vehicle_mileage(
        &self,
        vehicle_id: Uuid,
        mileage: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Vehicle> {
        if mileage < 0 {
            return Err(RepositoryError::Invalid("mileage must be non-negative".into()));
        }
        queries::vehicle::update_vehicle_mileage(&self.pool, vehicle_id, mileage, now).await
    }

    async fn update_schedule_due_date(
        &self,
        schedule_id: Uuid,
        next_due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceSchedule> {
        queries::schedule::update_schedule_due_date(&self.pool, schedule_id, next_due_date, now).await
    }

    async fn claim_schedule_reminder(
        &self,
        schedule_id: Uuid,
        status: MaintenanceStatus,
        sent_at: DateTime<Utc>,
        previous: &ReminderBookkeeping,
    ) -> RepoResult<bool> {
        queries::schedule::claim_schedule_reminder(&self.pool, schedule_id, status, sent_at, previous).await
    }

    async fn release_schedule_reminder(
        &self,
        schedule_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: &ReminderBookkeeping,
    ) -> RepoResult<()> {
        queries::schedule::release_schedule_reminder(&self.pool, schedule_id, claimed_at, previous).await
    }

    async fn claim_mileage_reminder(
        &self,
        vehicle_id: Uuid,
        sent_at: DateTime<Utc>,
        previous: Option<&StoredTimestamp>,
    ) -> RepoResult<bool> {
        queries::vehicle::claim_mileage_reminder(&self.pool, vehicle_id, sent_at, previous).await
    }

    async fn release_mileage_reminder(
        &self,
        vehicle_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: Option<&StoredTimestamp>,
    ) -> RepoResult<()> {
        queries::vehicle::release_mileage_reminder(&self.pool, vehicle_id, claimed_at, previous).await
    }
}
