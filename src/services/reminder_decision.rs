//! Reminder decisions.
//!
//! Both decisions are pure functions of their inputs and an injected `now`.
//! A "skip" always names its reason so the run report stays auditable.

use chrono::{DateTime, Utc};

use crate::config::ReminderSettings;
use crate::types::{MaintenanceStatus, ReminderBookkeeping, ReminderDecision, SkipReason, Vehicle};

/// Should a reminder for a schedule currently in `status` be sent now?
///
/// Sends when never sent, when the recorded timestamp is unparsable, when the
/// status changed since the last send, or once the repeat window has elapsed.
/// `Ok` is never a trigger.
pub fn decide_schedule_reminder(
    status: MaintenanceStatus,
    bookkeeping: &ReminderBookkeeping,
    settings: &ReminderSettings,
    now: DateTime<Utc>,
) -> ReminderDecision {
    if status == MaintenanceStatus::Ok {
        return ReminderDecision::Skip(SkipReason::NotRequired);
    }

    let Some(raw_sent_at) = &bookkeeping.sent_at else {
        return ReminderDecision::Send;
    };

    let Some(sent_at) = raw_sent_at.parse() else {
        return ReminderDecision::Send;
    };

    if bookkeeping.status != Some(status) {
        return ReminderDecision::Send;
    }

    if elapsed_hours(sent_at, now) >= settings.repeat_hours as i64 {
        ReminderDecision::Send
    } else {
        ReminderDecision::Skip(SkipReason::RecentlySent)
    }
}

/// Should the vehicle's owner be nudged to confirm the odometer?
///
/// The baseline is the last mileage confirmation, or the vehicle's creation
/// time when it was never confirmed. An unparsable baseline fails closed.
pub fn decide_mileage_reminder(
    vehicle: &Vehicle,
    settings: &ReminderSettings,
    now: DateTime<Utc>,
) -> ReminderDecision {
    let baseline = vehicle
        .last_mileage_confirmed_at
        .as_ref()
        .unwrap_or(&vehicle.created_at);

    let Some(baseline) = baseline.parse() else {
        return ReminderDecision::Skip(SkipReason::InvalidBaseline);
    };

    if (now - baseline).num_days() < settings.mileage_stale_days as i64 {
        return ReminderDecision::Skip(SkipReason::WithinThreshold);
    }

    // An unreadable previous nudge counts as never sent
    match vehicle.last_mileage_reminder_at.as_ref().and_then(|ts| ts.parse()) {
        Some(last_sent) if elapsed_hours(last_sent, now) < settings.repeat_hours as i64 => {
            ReminderDecision::Skip(SkipReason::RecentlySent)
        }
        _ => ReminderDecision::Send,
    }
}

/// Whole hours elapsed, truncated toward zero.
fn elapsed_hours(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_hours()
}
