//! Reminder dispatch run.
//!
//! One pass over every vehicle with a reminder contact:
//! evaluate schedules, decide, claim the reminder, mail, then the
//! mileage-staleness nudge for the vehicle. Each schedule (and each vehicle's
//! mileage nudge) is handled under its own lock with a fresh read. The claim
//! is a conditional write on the previous bookkeeping, so a worker in another
//! process that decided on the same state loses the claim and sends nothing.
//! A failed send releases the claim.
//!
//! Per-item mailer and repository failures land in the report. Only failing
//! to enumerate vehicles or schedules aborts the run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReminderSettings;
use crate::db::{MaintenanceRepository, RepositoryError};
use crate::defaults::{MILEAGE_UPDATE_PATH, SERVICE_LOG_PATH};
use crate::services::due_status::{evaluate_schedule, evaluate_schedules};
use crate::services::reminder_decision::{decide_mileage_reminder, decide_schedule_reminder};
use crate::services::reminder_locks::{LockKey, ReminderLocks};
use crate::services::reminder_mailer::{context_url, ReminderMailer};
use crate::types::{
    DispatchOutcome, MaintenanceStatus, ReminderDecision, ReminderRunReport, SkipReason, Vehicle,
};

/// Run-fatal failure: no meaningful report can be produced.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to list vehicles with a reminder contact: {0}")]
    EnumerateVehicles(#[source] RepositoryError),

    #[error("failed to list schedules for vehicle {vehicle_id}: {source}")]
    EnumerateSchedules {
        vehicle_id: Uuid,
        #[source]
        source: RepositoryError,
    },
}

pub struct ReminderDispatcher {
    repo: Arc<dyn MaintenanceRepository>,
    mailer: Arc<dyn ReminderMailer>,
    settings: ReminderSettings,
    app_base_url: String,
    locks: ReminderLocks,
}

impl ReminderDispatcher {
    pub fn new(
        repo: Arc<dyn MaintenanceRepository>,
        mailer: Arc<dyn ReminderMailer>,
        settings: ReminderSettings,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            mailer,
            settings,
            app_base_url: app_base_url.into(),
            locks: ReminderLocks::new(),
        }
    }

    /// Run one dispatch pass at `now`.
    ///
    /// Once `cancel` fires, the in-flight item finishes and no new sends are
    /// issued; the report is marked `cancelled`.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ReminderRunReport, DispatchError> {
        let mut report = ReminderRunReport::new(now);

        let vehicles = self
            .repo
            .list_vehicles_with_contact()
            .await
            .map_err(DispatchError::EnumerateVehicles)?;

        info!(vehicles = vehicles.len(), "Starting reminder run");

        'vehicles: for vehicle in &vehicles {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some(recipient) = vehicle.reminder_contact() else {
                continue;
            };

            let schedules = self
                .repo
                .list_schedules_for_vehicle(vehicle.id)
                .await
                .map_err(|source| DispatchError::EnumerateSchedules {
                    vehicle_id: vehicle.id,
                    source,
                })?;

            report.processed_vehicles += 1;

            for service in evaluate_schedules(&schedules, vehicle, now) {
                if service.status == MaintenanceStatus::Ok {
                    continue;
                }
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'vehicles;
                }

                if let Some((status, outcome)) = self
                    .dispatch_schedule(vehicle, recipient, service.schedule.id, service.status, now)
                    .await
                {
                    report.record_schedule(service.schedule.id, vehicle.id, recipient, status, outcome);
                }
            }

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if let Some(outcome) = self.dispatch_mileage(vehicle.id, recipient, now).await {
                report.record_mileage(vehicle.id, recipient, outcome);
            }
        }

        self.locks.prune();

        info!(
            processed = report.processed_vehicles,
            sent = report.sent_count,
            skipped = report.skipped_count,
            errors = report.error_count,
            mileage_sent = report.mileage_sent_count,
            mileage_errors = report.mileage_error_count,
            cancelled = report.cancelled,
            "Reminder run finished"
        );

        Ok(report)
    }

    /// Read-decide-claim-send for one schedule under its lock.
    ///
    /// Returns `None` when the fresh read shows nothing to report: the
    /// schedule disappeared or became `ok` meanwhile.
    async fn dispatch_schedule(
        &self,
        vehicle: &Vehicle,
        recipient: &str,
        schedule_id: Uuid,
        listed_status: MaintenanceStatus,
        now: DateTime<Utc>,
    ) -> Option<(MaintenanceStatus, DispatchOutcome)> {
        let _guard = self.locks.acquire(LockKey::Schedule(schedule_id)).await;

        let schedule = match self.repo.get_schedule(schedule_id).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => {
                debug!(schedule_id = %schedule_id, "Schedule vanished before dispatch");
                return None;
            }
            Err(e) => {
                warn!(schedule_id = %schedule_id, "Failed to reload schedule: {}", e);
                return Some((listed_status, DispatchOutcome::Failed { error: e.to_string() }));
            }
        };

        let service = evaluate_schedule(&schedule, vehicle.known_mileage(), now);
        if service.status == MaintenanceStatus::Ok {
            return None;
        }
        let status = service.status;
        let previous = schedule.bookkeeping();

        if let ReminderDecision::Skip(reason) = decide_schedule_reminder(status, &previous, &self.settings, now) {
            return Some((status, DispatchOutcome::Skipped { reason }));
        }

        match self.repo.claim_schedule_reminder(schedule_id, status, now, &previous).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(schedule_id = %schedule_id, "Reminder already claimed by another worker");
                return Some((status, DispatchOutcome::Skipped { reason: SkipReason::ClaimedElsewhere }));
            }
            Err(e) => {
                warn!(schedule_id = %schedule_id, "Failed to claim reminder: {}", e);
                return Some((
                    status,
                    DispatchOutcome::Failed { error: format!("reminder not claimed: {}", e) },
                ));
            }
        }

        let link = context_url(&self.app_base_url, SERVICE_LOG_PATH);
        match self
            .mailer
            .send_schedule_reminder(recipient, vehicle, &service, link.as_deref())
            .await
        {
            Ok(delivery_id) => {
                info!(schedule_id = %schedule_id, status = status.as_str(), delivery_id = %delivery_id, "Reminder sent");
                Some((status, DispatchOutcome::Sent { delivery_id }))
            }
            Err(e) => {
                warn!(schedule_id = %schedule_id, to = %recipient, "Reminder email failed: {}", e);
                let mut error = e.to_string();
                if let Err(release) = self.repo.release_schedule_reminder(schedule_id, now, &previous).await {
                    warn!(schedule_id = %schedule_id, "Failed to release reminder claim: {}", release);
                    error = format!("{}; claim not released: {}", error, release);
                }
                Some((status, DispatchOutcome::Failed { error }))
            }
        }
    }

    /// Mileage-staleness decision for one vehicle under its lock.
    async fn dispatch_mileage(
        &self,
        vehicle_id: Uuid,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Option<DispatchOutcome> {
        let _guard = self.locks.acquire(LockKey::Vehicle(vehicle_id)).await;

        let vehicle = match self.repo.get_vehicle(vehicle_id).await {
            Ok(Some(vehicle)) => vehicle,
            Ok(None) => return None,
            Err(e) => {
                warn!(vehicle_id = %vehicle_id, "Failed to reload vehicle: {}", e);
                return Some(DispatchOutcome::Failed { error: e.to_string() });
            }
        };

        if let ReminderDecision::Skip(reason) = decide_mileage_reminder(&vehicle, &self.settings, now) {
            return Some(DispatchOutcome::Skipped { reason });
        }

        let previous = vehicle.last_mileage_reminder_at.as_ref();
        match self.repo.claim_mileage_reminder(vehicle_id, now, previous).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(vehicle_id = %vehicle_id, "Mileage reminder already claimed by another worker");
                return Some(DispatchOutcome::Skipped { reason: SkipReason::ClaimedElsewhere });
            }
            Err(e) => {
                warn!(vehicle_id = %vehicle_id, "Failed to claim mileage reminder: {}", e);
                return Some(DispatchOutcome::Failed { error: format!("reminder not claimed: {}", e) });
            }
        }

        let link = context_url(&self.app_base_url, MILEAGE_UPDATE_PATH);
        match self
            .mailer
            .send_mileage_reminder(recipient, &vehicle, link.as_deref())
            .await
        {
            Ok(delivery_id) => {
                info!(vehicle_id = %vehicle_id, delivery_id = %delivery_id, "Mileage reminder sent");
                Some(DispatchOutcome::Sent { delivery_id })
            }
            Err(e) => {
                warn!(vehicle_id = %vehicle_id, to = %recipient, "Mileage reminder email failed: {}", e);
                let mut error = e.to_string();
                if let Err(release) = self.repo.release_mileage_reminder(vehicle_id, now, previous).await {
                    warn!(vehicle_id = %vehicle_id, "Failed to release mileage reminder claim: {}", release);
                    error = format!("{}; claim not released: {}", error, release);
                }
                Some(DispatchOutcome::Failed { error })
            }
        }
    }
}
