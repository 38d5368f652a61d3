//! Service log database queries

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries::schedule::{get_schedule_for_update, update_schedule_recurrence};
use crate::db::queries::vehicle::raise_vehicle_mileage;
use crate::db::repository::{RepoResult, RepositoryError};
use crate::services::recurrence::apply_completed_service;
use crate::types::{CompletedService, ServiceLog, StoredDate, StoredTimestamp};

/// Service history of a vehicle, newest first
pub async fn list_service_logs(pool: &PgPool, vehicle_id: Uuid) -> RepoResult<Vec<ServiceLog>> {
    let logs = sqlx::query_as::<_, ServiceLog>(
        r#"
        SELECT id, vehicle_id, schedule_id, service_code, service_name,
               service_date, mileage, cost_cents, notes, created_at
        FROM service_logs
        WHERE vehicle_id = $1
        ORDER BY service_date DESC, created_at DESC
        "#
    )
    .bind(vehicle_id)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

async fn insert_service_log(
    executor: impl sqlx::PgExecutor<'_>,
    vehicle_id: Uuid,
    schedule_id: Option<Uuid>,
    service_code: Option<&str>,
    service_name: &str,
    service: &CompletedService,
    now: DateTime<Utc>,
) -> RepoResult<ServiceLog> {
    let log = sqlx::query_as::<_, ServiceLog>(
        r#"
        INSERT INTO service_logs (
            id, vehicle_id, schedule_id, service_code, service_name,
            service_date, mileage, cost_cents, notes, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, vehicle_id, schedule_id, service_code, service_name,
                  service_date, mileage, cost_cents, notes, created_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(vehicle_id)
    .bind(schedule_id)
    .bind(service_code)
    .bind(service_name)
    .bind(StoredDate::from(service.service_date).as_str())
    .bind(service.mileage)
    .bind(service.cost_cents)
    .bind(service.notes.as_deref())
    .bind(StoredTimestamp::from(now).as_str())
    .fetch_one(executor)
    .await?;

    Ok(log)
}

/// Log a scheduled service and roll its schedule forward in one transaction
pub async fn record_completed_service(
    pool: &PgPool,
    schedule_id: Uuid,
    service: &CompletedService,
    now: DateTime<Utc>,
) -> RepoResult<ServiceLog> {
    let mut tx = pool.begin().await?;

    let mut schedule = get_schedule_for_update(&mut *tx, schedule_id)
        .await?
        .ok_or(RepositoryError::NotFound { entity: "schedule", id: schedule_id })?;

    apply_completed_service(&mut schedule, service, now);
    update_schedule_recurrence(&mut *tx, &schedule).await?;

    let log = insert_service_log(
        &mut *tx,
        schedule.vehicle_id,
        Some(schedule.id),
        Some(&schedule.service_code),
        &schedule.service_name,
        service,
        now,
    )
    .await?;

    if let Some(mileage) = service.mileage {
        raise_vehicle_mileage(&mut *tx, schedule.vehicle_id, mileage, now).await?;
    }

    tx.commit().await?;

    Ok(log)
}

/// Log an ad-hoc service that is not tied to a schedule
pub async fn record_custom_service(
    pool: &PgPool,
    vehicle_id: Uuid,
    service_name: &str,
    service: &CompletedService,
    now: DateTime<Utc>,
) -> RepoResult<ServiceLog> {
    let service_name = service_name.trim();
    if service_name.is_empty() {
        return Err(RepositoryError::Invalid("service name is required".into()));
    }

    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM vehicles WHERE id = $1)")
        .bind(vehicle_id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(RepositoryError::NotFound { entity: "vehicle", id: vehicle_id });
    }

    let log = insert_service_log(&mut *tx, vehicle_id, None, None, service_name, service, now).await?;

    if let Some(mileage) = service.mileage {
        raise_vehicle_mileage(&mut *tx, vehicle_id, mileage, now).await?;
    }

    tx.commit().await?;

    Ok(log)
}
