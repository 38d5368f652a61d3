//! Maintenance schedule types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stamp::{StoredDate, StoredTimestamp};

/// Maintenance status of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Ok,
    DueSoon,
    Overdue,
}

impl MaintenanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Ok => "ok",
            MaintenanceStatus::DueSoon => "due_soon",
            MaintenanceStatus::Overdue => "overdue",
        }
    }

    /// Parse a stored status; anything unknown reads as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "ok" => Some(MaintenanceStatus::Ok),
            "due_soon" => Some(MaintenanceStatus::DueSoon),
            "overdue" => Some(MaintenanceStatus::Overdue),
            _ => None,
        }
    }
}

/// Recurring maintenance obligation tied to one vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSchedule {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub service_code: String,
    pub service_name: String,
    pub interval_months: Option<i32>,
    pub interval_miles: Option<i64>,
    /// Lead window before the due date; zero or negative disables it
    pub reminder_lead_days: Option<i32>,
    /// Lead window before the due mileage; zero or negative disables it
    pub reminder_lead_miles: Option<i64>,
    pub next_due_date: Option<StoredDate>,
    pub next_due_mileage: Option<i64>,
    pub last_completed_date: Option<StoredDate>,
    pub last_completed_mileage: Option<i64>,
    // Reminder bookkeeping, written only after a delivered reminder
    pub last_reminder_sent_at: Option<StoredTimestamp>,
    pub last_reminder_status: Option<MaintenanceStatus>,
    pub created_at: StoredTimestamp,
    pub updated_at: StoredTimestamp,
}

/// Last-sent snapshot used for reminder idempotency
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderBookkeeping {
    pub sent_at: Option<StoredTimestamp>,
    pub status: Option<MaintenanceStatus>,
}

impl ServiceSchedule {
    pub fn bookkeeping(&self) -> ReminderBookkeeping {
        ReminderBookkeeping {
            sent_at: self.last_reminder_sent_at.clone(),
            status: self.last_reminder_status,
        }
    }
}

/// Request to move a schedule's target date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDueDateRequest {
    pub schedule_id: Uuid,
    pub next_due_date: chrono::NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&MaintenanceStatus::DueSoon).unwrap();
        assert_eq!(json, "\"due_soon\"");
    }

    #[test]
    fn status_parse_round_trips_known_values() {
        for status in [MaintenanceStatus::Ok, MaintenanceStatus::DueSoon, MaintenanceStatus::Overdue] {
            assert_eq!(MaintenanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MaintenanceStatus::parse("snoozed"), None);
    }
}
