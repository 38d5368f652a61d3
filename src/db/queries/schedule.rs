//! Service schedule database queries

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::db::repository::{RepoResult, RepositoryError};
use crate::services::recurrence::{materialize_schedules, ServiceTemplate};
use crate::types::{
    MaintenanceStatus, ReminderBookkeeping, ServiceSchedule, StoredDate, StoredTimestamp, Vehicle,
};

/// Raw schedule row; the status column is free text
#[derive(Debug, FromRow)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub service_code: String,
    pub service_name: String,
    pub interval_months: Option<i32>,
    pub interval_miles: Option<i64>,
    pub reminder_lead_days: Option<i32>,
    pub reminder_lead_miles: Option<i64>,
    pub next_due_date: Option<StoredDate>,
    pub next_due_mileage: Option<i64>,
    pub last_completed_date: Option<StoredDate>,
    pub last_completed_mileage: Option<i64>,
    pub last_reminder_sent_at: Option<StoredTimestamp>,
    pub last_reminder_status: Option<String>,
    pub created_at: StoredTimestamp,
    pub updated_at: StoredTimestamp,
}

impl From<ScheduleRow> for ServiceSchedule {
    fn from(row: ScheduleRow) -> Self {
        ServiceSchedule {
            id: row.id,
            vehicle_id: row.vehicle_id,
            service_code: row.service_code,
            service_name: row.service_name,
            interval_months: row.interval_months,
            interval_miles: row.interval_miles,
            reminder_lead_days: row.reminder_lead_days,
            reminder_lead_miles: row.reminder_lead_miles,
            next_due_date: row.next_due_date,
            next_due_mileage: row.next_due_mileage,
            last_completed_date: row.last_completed_date,
            last_completed_mileage: row.last_completed_mileage,
            last_reminder_sent_at: row.last_reminder_sent_at,
            last_reminder_status: row.last_reminder_status.as_deref().and_then(MaintenanceStatus::parse),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert one materialized schedule
pub async fn insert_schedule(
    executor: impl sqlx::PgExecutor<'_>,
    schedule: &ServiceSchedule,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO service_schedules (
            id, vehicle_id, service_code, service_name,
            interval_months, interval_miles, reminder_lead_days, reminder_lead_miles,
            next_due_date, next_due_mileage, last_completed_date, last_completed_mileage,
            last_reminder_sent_at, last_reminder_status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#
    )
    .bind(schedule.id)
    .bind(schedule.vehicle_id)
    .bind(&schedule.service_code)
    .bind(&schedule.service_name)
    .bind(schedule.interval_months)
    .bind(schedule.interval_miles)
    .bind(schedule.reminder_lead_days)
    .bind(schedule.reminder_lead_miles)
    .bind(schedule.next_due_date.as_ref().map(|d| d.as_str()))
    .bind(schedule.next_due_mileage)
    .bind(schedule.last_completed_date.as_ref().map(|d| d.as_str()))
    .bind(schedule.last_completed_mileage)
    .bind(schedule.last_reminder_sent_at.as_ref().map(|t| t.as_str()))
    .bind(schedule.last_reminder_status.map(|s| s.as_str()))
    .bind(schedule.created_at.as_str())
    .bind(schedule.updated_at.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// List schedules of a vehicle, dated first
pub async fn list_schedules_for_vehicle(pool: &PgPool, vehicle_id: Uuid) -> RepoResult<Vec<ServiceSchedule>> {
    let rows = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id, vehicle_id, service_code, service_name,
               interval_months, interval_miles, reminder_lead_days, reminder_lead_miles,
               next_due_date, next_due_mileage, last_completed_date, last_completed_mileage,
               last_reminder_sent_at, last_reminder_status, created_at, updated_at
        FROM service_schedules
        WHERE vehicle_id = $1
        ORDER BY next_due_date ASC NULLS LAST, service_name ASC
        "#
    )
    .bind(vehicle_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ServiceSchedule::from).collect())
}

/// Get a single schedule by ID
pub async fn get_schedule(pool: &PgPool, schedule_id: Uuid) -> RepoResult<Option<ServiceSchedule>> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id, vehicle_id, service_code, service_name,
               interval_months, interval_miles, reminder_lead_days, reminder_lead_miles,
               next_due_date, next_due_mileage, last_completed_date, last_completed_mileage,
               last_reminder_sent_at, last_reminder_status, created_at, updated_at
        FROM service_schedules
        WHERE id = $1
        "#
    )
    .bind(schedule_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ServiceSchedule::from))
}

/// Get a schedule and lock its row for the rest of the transaction
pub async fn get_schedule_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    schedule_id: Uuid,
) -> RepoResult<Option<ServiceSchedule>> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT id, vehicle_id, service_code, service_name,
               interval_months, interval_miles, reminder_lead_days, reminder_lead_miles,
               next_due_date, next_due_mileage, last_completed_date, last_completed_mileage,
               last_reminder_sent_at, last_reminder_status, created_at, updated_at
        FROM service_schedules
        WHERE id = $1
        FOR UPDATE
        "#
    )
    .bind(schedule_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(ServiceSchedule::from))
}

/// Materialize schedules for a vehicle that has none
pub async fn ensure_schedules_exist(
    pool: &PgPool,
    vehicle: &Vehicle,
    templates: &[ServiceTemplate],
    now: DateTime<Utc>,
) -> RepoResult<bool> {
    let mut tx = pool.begin().await?;

    // Serialize concurrent backfills of the same vehicle
    sqlx::query("SELECT id FROM vehicles WHERE id = $1 FOR UPDATE")
        .bind(vehicle.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound { entity: "vehicle", id: vehicle.id })?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM service_schedules WHERE vehicle_id = $1")
        .bind(vehicle.id)
        .fetch_one(&mut *tx)
        .await?;

    if existing > 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let reference = vehicle.created_at.parse().unwrap_or(now);
    let schedules = materialize_schedules(vehicle.id, vehicle.known_mileage(), reference, templates, now);
    for schedule in &schedules {
        insert_schedule(&mut *tx, schedule).await?;
    }

    tx.commit().await?;
    debug!(vehicle_id = %vehicle.id, count = schedules.len(), "Backfilled schedules");

    Ok(!schedules.is_empty())
}

/// Replace the target date of a schedule
pub async fn update_schedule_due_date(
    pool: &PgPool,
    schedule_id: Uuid,
    next_due_date: NaiveDate,
    now: DateTime<Utc>,
) -> RepoResult<ServiceSchedule> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        UPDATE service_schedules SET
            next_due_date = $2,
            updated_at = $3
        WHERE id = $1
        RETURNING id, vehicle_id, service_code, service_name,
                  interval_months, interval_miles, reminder_lead_days, reminder_lead_miles,
                  next_due_date, next_due_mileage, last_completed_date, last_completed_mileage,
                  last_reminder_sent_at, last_reminder_status, created_at, updated_at
        "#
    )
    .bind(schedule_id)
    .bind(StoredDate::from(next_due_date).as_str())
    .bind(StoredTimestamp::from(now).as_str())
    .fetch_optional(pool)
    .await?;

    row.map(ServiceSchedule::from)
        .ok_or(RepositoryError::NotFound { entity: "schedule", id: schedule_id })
}

/// Claim the reminder slot before sending: write the new bookkeeping only if
/// `last_reminder_sent_at` still holds the value the caller decided on.
pub async fn claim_schedule_reminder(
    pool: &PgPool,
    schedule_id: Uuid,
    status: MaintenanceStatus,
    sent_at: DateTime<Utc>,
    previous: &ReminderBookkeeping,
) -> RepoResult<bool> {
    let stamp = StoredTimestamp::from(sent_at);

    let result = sqlx::query(
        r#"
        UPDATE service_schedules SET
            last_reminder_sent_at = $2,
            last_reminder_status = $3,
            updated_at = $2
        WHERE id = $1 AND last_reminder_sent_at IS NOT DISTINCT FROM $4
        "#
    )
    .bind(schedule_id)
    .bind(stamp.as_str())
    .bind(status.as_str())
    .bind(previous.sent_at.as_ref().map(|t| t.as_str()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Put back the bookkeeping a failed send had claimed. No-op once someone
/// else has overwritten the claim.
pub async fn release_schedule_reminder(
    pool: &PgPool,
    schedule_id: Uuid,
    claimed_at: DateTime<Utc>,
    previous: &ReminderBookkeeping,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE service_schedules SET
            last_reminder_sent_at = $3,
            last_reminder_status = $4
        WHERE id = $1 AND last_reminder_sent_at = $2
        "#
    )
    .bind(schedule_id)
    .bind(StoredTimestamp::from(claimed_at).as_str())
    .bind(previous.sent_at.as_ref().map(|t| t.as_str()))
    .bind(previous.status.map(|s| s.as_str()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist the recurrence fields of a schedule after a completed service
pub async fn update_schedule_recurrence(
    executor: impl sqlx::PgExecutor<'_>,
    schedule: &ServiceSchedule,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE service_schedules SET
            next_due_date = $2,
            next_due_mileage = $3,
            last_completed_date = $4,
            last_completed_mileage = $5,
            last_reminder_sent_at = $6,
            last_reminder_status = $7,
            updated_at = $8
        WHERE id = $1
        "#
    )
    .bind(schedule.id)
    .bind(schedule.next_due_date.as_ref().map(|d| d.as_str()))
    .bind(schedule.next_due_mileage)
    .bind(schedule.last_completed_date.as_ref().map(|d| d.as_str()))
    .bind(schedule.last_completed_mileage)
    .bind(schedule.last_reminder_sent_at.as_ref().map(|t| t.as_str()))
    .bind(schedule.last_reminder_status.map(|s| s.as_str()))
    .bind(schedule.updated_at.as_str())
    .execute(executor)
    .await?;

    Ok(())
}
