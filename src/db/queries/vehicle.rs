//! Vehicle database queries

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries::schedule::insert_schedule;
use crate::db::repository::{RepoResult, RepositoryError};
use crate::services::recurrence::{materialize_schedules, ServiceTemplate};
use crate::types::{CreateVehicleRequest, StoredTimestamp, Vehicle};

/// List vehicles that have a reminder contact address
pub async fn list_vehicles_with_contact(pool: &PgPool) -> RepoResult<Vec<Vehicle>> {
    let vehicles = sqlx::query_as::<_, Vehicle>(
        r#"
        SELECT id, device_id, year, make, model, vin, contact_email, current_mileage,
               last_mileage_confirmed_at, last_mileage_reminder_at, created_at, updated_at
        FROM vehicles
        WHERE contact_email IS NOT NULL AND btrim(contact_email) <> ''
        ORDER BY created_at ASC, id ASC
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(vehicles)
}

/// Get a single vehicle by ID
pub async fn get_vehicle(pool: &PgPool, vehicle_id: Uuid) -> RepoResult<Option<Vehicle>> {
    let vehicle = sqlx::query_as::<_, Vehicle>(
        r#"
        SELECT id, device_id, year, make, model, vin, contact_email, current_mileage,
               last_mileage_confirmed_at, last_mileage_reminder_at, created_at, updated_at
        FROM vehicles
        WHERE id = $1
        "#
    )
    .bind(vehicle_id)
    .fetch_optional(pool)
    .await?;

    Ok(vehicle)
}

/// Create a vehicle together with its initial schedules
pub async fn create_vehicle(
    pool: &PgPool,
    request: &CreateVehicleRequest,
    templates: &[ServiceTemplate],
    now: DateTime<Utc>,
) -> RepoResult<Vehicle> {
    let make = request.make.trim();
    let model = request.model.trim();
    if make.is_empty() || model.is_empty() {
        return Err(RepositoryError::Invalid("make and model are required".into()));
    }

    let stamp = StoredTimestamp::from(now);
    let mileage = request.current_mileage.filter(|m| *m >= 0);
    let confirmed_at = mileage.map(|_| stamp.as_str());

    let mut tx = pool.begin().await?;

    let vehicle = sqlx::query_as::<_, Vehicle>(
        r#"
        INSERT INTO vehicles (
            id, device_id, year, make, model, vin, contact_email, current_mileage,
            last_mileage_confirmed_at, last_mileage_reminder_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $10)
        RETURNING id, device_id, year, make, model, vin, contact_email, current_mileage,
                  last_mileage_confirmed_at, last_mileage_reminder_at, created_at, updated_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(&request.device_id)
    .bind(request.year)
    .bind(make)
    .bind(model)
    .bind(request.normalized_vin())
    .bind(request.normalized_contact_email())
    .bind(mileage)
    .bind(confirmed_at)
    .bind(stamp.as_str())
    .fetch_one(&mut *tx)
    .await?;

    for schedule in materialize_schedules(vehicle.id, mileage, now, templates, now) {
        insert_schedule(&mut *tx, &schedule).await?;
    }

    tx.commit().await?;

    Ok(vehicle)
}

/// Set the odometer reading and mark it confirmed
pub async fn update_vehicle_mileage(
    pool: &PgPool,
    vehicle_id: Uuid,
    mileage: i64,
    now: DateTime<Utc>,
) -> RepoResult<Vehicle> {
    let stamp = StoredTimestamp::from(now);

    let vehicle = sqlx::query_as::<_, Vehicle>(
        r#"
        UPDATE vehicles SET
            current_mileage = $2,
            last_mileage_confirmed_at = $3,
            last_mileage_reminder_at = NULL,
            updated_at = $3
        WHERE id = $1
        RETURNING id, device_id, year, make, model, vin, contact_email, current_mileage,
                  last_mileage_confirmed_at, last_mileage_reminder_at, created_at, updated_at
        "#
    )
    .bind(vehicle_id)
    .bind(mileage)
    .bind(stamp.as_str())
    .fetch_optional(pool)
    .await?;

    vehicle.ok_or(RepositoryError::NotFound { entity: "vehicle", id: vehicle_id })
}

/// Raise the odometer reading if `mileage` is higher than the recorded one
pub async fn raise_vehicle_mileage(
    executor: impl sqlx::PgExecutor<'_>,
    vehicle_id: Uuid,
    mileage: i64,
    now: DateTime<Utc>,
) -> RepoResult<bool> {
    let stamp = StoredTimestamp::from(now);

    let result = sqlx::query(
        r#"
        UPDATE vehicles SET
            current_mileage = $2,
            last_mileage_confirmed_at = $3,
            last_mileage_reminder_at = NULL,
            updated_at = $3
        WHERE id = $1 AND (current_mileage IS NULL OR current_mileage < $2)
        "#
    )
    .bind(vehicle_id)
    .bind(mileage)
    .bind(stamp.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Claim the mileage-nudge slot before sending, conditional on the previous
/// nudge timestamp
pub async fn claim_mileage_reminder(
    pool: &PgPool,
    vehicle_id: Uuid,
    sent_at: DateTime<Utc>,
    previous: Option<&StoredTimestamp>,
) -> RepoResult<bool> {
    let stamp = StoredTimestamp::from(sent_at);

    let result = sqlx::query(
        r#"
        UPDATE vehicles SET
            last_mileage_reminder_at = $2,
            updated_at = $2
        WHERE id = $1 AND last_mileage_reminder_at IS NOT DISTINCT FROM $3
        "#
    )
    .bind(vehicle_id)
    .bind(stamp.as_str())
    .bind(previous.map(|t| t.as_str()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Undo a mileage-nudge claim after a failed send
pub async fn release_mileage_reminder(
    pool: &PgPool,
    vehicle_id: Uuid,
    claimed_at: DateTime<Utc>,
    previous: Option<&StoredTimestamp>,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        UPDATE vehicles SET
            last_mileage_reminder_at = $3
        WHERE id = $1 AND last_mileage_reminder_at = $2
        "#
    )
    .bind(vehicle_id)
    .bind(StoredTimestamp::from(claimed_at).as_str())
    .bind(previous.map(|t| t.as_str()))
    .execute(pool)
    .await?;

    Ok(())
}
