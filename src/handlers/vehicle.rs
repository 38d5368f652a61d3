//! Vehicle message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::MaintenanceRepository;
use crate::defaults::default_service_templates;
use crate::handlers::{serve, HandlerError, SUBJECT_VEHICLE_CREATE, SUBJECT_VEHICLE_MILEAGE_UPDATE};
use crate::types::{CreateVehicleRequest, Request, UpdateMileageRequest, Vehicle};

pub async fn process_create(
    repo: &dyn MaintenanceRepository,
    request: &CreateVehicleRequest,
    now: DateTime<Utc>,
) -> std::result::Result<Vehicle, HandlerError> {
    if request.device_id.trim().is_empty() {
        return Err(HandlerError::invalid("deviceId is required"));
    }
    if request.make.trim().is_empty() || request.model.trim().is_empty() {
        return Err(HandlerError::invalid("make and model are required"));
    }
    if request.current_mileage.is_some_and(|m| m < 0) {
        return Err(HandlerError::invalid("currentMileage must be non-negative"));
    }

    let vehicle = repo
        .create_vehicle(request, &default_service_templates(), now)
        .await?;

    info!(vehicle_id = %vehicle.id, device_id = %vehicle.device_id, "Vehicle created");
    Ok(vehicle)
}

pub async fn process_update_mileage(
    repo: &dyn MaintenanceRepository,
    request: &UpdateMileageRequest,
    now: DateTime<Utc>,
) -> std::result::Result<Vehicle, HandlerError> {
    if request.current_mileage < 0 {
        return Err(HandlerError::invalid("currentMileage must be non-negative"));
    }

    let vehicle = repo
        .update_vehicle_mileage(request.vehicle_id, request.current_mileage, now)
        .await?;

    info!(vehicle_id = %vehicle.id, mileage = request.current_mileage, "Mileage confirmed");
    Ok(vehicle)
}

/// Handle vehicle.create messages
pub async fn handle_create(
    client: Client,
    subscriber: Subscriber,
    repo: Arc<dyn MaintenanceRepository>,
) -> Result<()> {
    serve(client, subscriber, SUBJECT_VEHICLE_CREATE, move |request: Request<CreateVehicleRequest>| {
        let repo = repo.clone();
        async move { process_create(repo.as_ref(), &request.payload, Utc::now()).await }
    })
    .await
}

/// Handle vehicle.mileage.update messages
pub async fn handle_update_mileage(
    client: Client,
    subscriber: Subscriber,
    repo: Arc<dyn MaintenanceRepository>,
) -> Result<()> {
    serve(
        client,
        subscriber,
        SUBJECT_VEHICLE_MILEAGE_UPDATE,
        move |request: Request<UpdateMileageRequest>| {
            let repo = repo.clone();
            async move { process_update_mileage(repo.as_ref(), &request.payload, Utc::now()).await }
        },
    )
    .await
}
