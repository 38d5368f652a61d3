//! Reminder decision and run report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schedule::MaintenanceStatus;

/// Why a reminder was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Mileage was confirmed recently enough
    WithinThreshold,
    /// Same state already reminded inside the repeat window
    RecentlySent,
    /// No usable mileage baseline timestamp
    InvalidBaseline,
    /// Nothing to remind about
    NotRequired,
    /// Another worker claimed this reminder first
    ClaimedElsewhere,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::WithinThreshold => "within_threshold",
            SkipReason::RecentlySent => "recently_sent",
            SkipReason::InvalidBaseline => "invalid_baseline",
            SkipReason::NotRequired => "not_required",
            SkipReason::ClaimedElsewhere => "claimed_elsewhere",
        }
    }
}

/// Result of a reminder decision. A skip always carries its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDecision {
    Send,
    Skip(SkipReason),
}

impl ReminderDecision {
    pub fn should_send(&self) -> bool {
        matches!(self, ReminderDecision::Send)
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            ReminderDecision::Send => None,
            ReminderDecision::Skip(reason) => Some(*reason),
        }
    }
}

/// Outcome of one dispatch attempt. Bookkeeping is claimed before the send
/// and survives only for `Sent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DispatchOutcome {
    #[serde(rename_all = "camelCase")]
    Sent { delivery_id: String },
    #[serde(rename_all = "camelCase")]
    Skipped { reason: SkipReason },
    #[serde(rename_all = "camelCase")]
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentReminder {
    pub schedule_id: Uuid,
    pub vehicle_id: Uuid,
    pub email: String,
    pub status: MaintenanceStatus,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedReminder {
    pub schedule_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: MaintenanceStatus,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedReminder {
    pub schedule_id: Uuid,
    pub vehicle_id: Uuid,
    pub email: String,
    pub status: MaintenanceStatus,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentMileageReminder {
    pub vehicle_id: Uuid,
    pub email: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedMileageReminder {
    pub vehicle_id: Uuid,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMileageReminder {
    pub vehicle_id: Uuid,
    pub email: String,
    pub error: String,
}

/// Aggregated result of one reminder dispatch pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRunReport {
    pub started_at: DateTime<Utc>,
    pub processed_vehicles: usize,
    pub sent_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub mileage_sent_count: usize,
    pub mileage_skipped_count: usize,
    pub mileage_error_count: usize,
    pub sent: Vec<SentReminder>,
    pub skipped: Vec<SkippedReminder>,
    pub errors: Vec<FailedReminder>,
    pub mileage_sent: Vec<SentMileageReminder>,
    pub mileage_skipped: Vec<SkippedMileageReminder>,
    pub mileage_errors: Vec<FailedMileageReminder>,
    /// Run stopped early; counts reflect exactly what was attempted
    pub cancelled: bool,
}

impl ReminderRunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            processed_vehicles: 0,
            sent_count: 0,
            skipped_count: 0,
            error_count: 0,
            mileage_sent_count: 0,
            mileage_skipped_count: 0,
            mileage_error_count: 0,
            sent: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            mileage_sent: Vec::new(),
            mileage_skipped: Vec::new(),
            mileage_errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record_schedule(
        &mut self,
        schedule_id: Uuid,
        vehicle_id: Uuid,
        email: &str,
        status: MaintenanceStatus,
        outcome: DispatchOutcome,
    ) {
        match outcome {
            DispatchOutcome::Sent { delivery_id } => {
                self.sent.push(SentReminder {
                    schedule_id,
                    vehicle_id,
                    email: email.to_string(),
                    status,
                    message_id: delivery_id,
                });
                self.sent_count += 1;
            }
            DispatchOutcome::Skipped { reason } => {
                self.skipped.push(SkippedReminder {
                    schedule_id,
                    vehicle_id,
                    status,
                    reason,
                });
                self.skipped_count += 1;
            }
            DispatchOutcome::Failed { error } => {
                self.errors.push(FailedReminder {
                    schedule_id,
                    vehicle_id,
                    email: email.to_string(),
                    status,
                    error,
                });
                self.error_count += 1;
            }
        }
    }

    pub fn record_mileage(&mut self, vehicle_id: Uuid, email: &str, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent { delivery_id } => {
                self.mileage_sent.push(SentMileageReminder {
                    vehicle_id,
                    email: email.to_string(),
                    message_id: delivery_id,
                });
                self.mileage_sent_count += 1;
            }
            DispatchOutcome::Skipped { reason } => {
                self.mileage_skipped.push(SkippedMileageReminder { vehicle_id, reason });
                self.mileage_skipped_count += 1;
            }
            DispatchOutcome::Failed { error } => {
                self.mileage_errors.push(FailedMileageReminder {
                    vehicle_id,
                    email: email.to_string(),
                    error,
                });
                self.mileage_error_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_recorded_outcomes() {
        let mut report = ReminderRunReport::new(Utc::now());
        let email = "alex.tan@example.com";
        report.record_schedule(
            Uuid::new_v4(),
            Uuid::nil(),
            email,
            MaintenanceStatus::Overdue,
            DispatchOutcome::Sent { delivery_id: "msg-1".into() },
        );
        report.record_schedule(
            Uuid::new_v4(),
            Uuid::nil(),
            email,
            MaintenanceStatus::DueSoon,
            DispatchOutcome::Skipped { reason: SkipReason::RecentlySent },
        );
        report.record_mileage(
            Uuid::nil(),
            email,
            DispatchOutcome::Failed { error: "smtp down".into() },
        );

        assert_eq!(report.sent_count, 1);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.error_count, 0);
        assert_eq!(report.mileage_error_count, 1);
        assert_eq!(report.mileage_errors[0].error, "smtp down");
    }

    #[test]
    fn report_serializes_camel_case_counts() {
        let report = ReminderRunReport::new(Utc::now());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["processedVehicles"], 0);
        assert_eq!(json["mileageSentCount"], 0);
        assert_eq!(json["cancelled"], false);
    }

    #[test]
    fn skip_reason_serializes_machine_readable() {
        let outcome = DispatchOutcome::Skipped { reason: SkipReason::InvalidBaseline };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"type\":\"skipped\""));
        assert!(json.contains("\"reason\":\"invalid_baseline\""));
    }

    #[test]
    fn decision_exposes_reason_only_when_skipping() {
        assert_eq!(ReminderDecision::Send.skip_reason(), None);
        let skip = ReminderDecision::Skip(SkipReason::WithinThreshold);
        assert!(!skip.should_send());
        assert_eq!(skip.skip_reason().map(|r| r.as_str()), Some("within_threshold"));
    }
}
