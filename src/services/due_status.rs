//! Due-status evaluation for maintenance schedules.
//!
//! Pure functions: a schedule plus the vehicle's mileage and an injected "now"
//! give a status and the figures behind it. Unparsable dates and negative
//! mileages count as absent, so evaluation never fails.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::services::labels::format_display_date;
use crate::types::{MaintenanceStatus, ServiceSchedule, Vehicle};

/// A schedule paired with its evaluated status. Recomputed on every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingService {
    pub schedule: ServiceSchedule,
    pub status: MaintenanceStatus,
    pub due_date: Option<NaiveDate>,
    /// Calendar days from today to the due date; <= 0 means due or past
    pub days_until_due: Option<i64>,
    /// Due mileage minus current mileage; <= 0 means reached
    pub miles_until_due: Option<i64>,
    pub due_date_label: Option<String>,
}

/// Evaluate one schedule against the vehicle's current mileage at `now`.
pub fn evaluate_schedule(
    schedule: &ServiceSchedule,
    current_mileage: Option<i64>,
    now: DateTime<Utc>,
) -> UpcomingService {
    let due_date = schedule.next_due_date.as_ref().and_then(|d| d.parse());
    let days_until_due = due_date.map(|due| (due - now.date_naive()).num_days());

    let current_mileage = current_mileage.filter(|m| *m >= 0);
    let due_mileage = schedule.next_due_mileage.filter(|m| *m >= 0);
    let miles_until_due = match (due_mileage, current_mileage) {
        (Some(due), Some(current)) => Some(due - current),
        _ => None,
    };

    let lead_days = schedule.reminder_lead_days.unwrap_or(0) as i64;
    let lead_miles = schedule.reminder_lead_miles.unwrap_or(0);

    let status = derive_status(days_until_due, miles_until_due, lead_days, lead_miles);

    UpcomingService {
        schedule: schedule.clone(),
        status,
        due_date,
        days_until_due,
        miles_until_due,
        due_date_label: due_date.map(format_display_date),
    }
}

/// Evaluate every schedule of a vehicle, preserving input order.
pub fn evaluate_schedules(
    schedules: &[ServiceSchedule],
    vehicle: &Vehicle,
    now: DateTime<Utc>,
) -> Vec<UpcomingService> {
    let mileage = vehicle.known_mileage();
    schedules
        .iter()
        .map(|schedule| evaluate_schedule(schedule, mileage, now))
        .collect()
}

fn derive_status(
    days_until_due: Option<i64>,
    miles_until_due: Option<i64>,
    lead_days: i64,
    lead_miles: i64,
) -> MaintenanceStatus {
    let overdue = days_until_due.is_some_and(|d| d <= 0) || miles_until_due.is_some_and(|m| m <= 0);
    if overdue {
        return MaintenanceStatus::Overdue;
    }

    // Non-positive leads disable their window
    let soon_by_date = lead_days > 0 && days_until_due.is_some_and(|d| d <= lead_days);
    let soon_by_miles = lead_miles > 0 && miles_until_due.is_some_and(|m| m <= lead_miles);
    if soon_by_date || soon_by_miles {
        MaintenanceStatus::DueSoon
    } else {
        MaintenanceStatus::Ok
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::labels::{reminder_preview_date, reminder_summary};
    use crate::types::{StoredDate, StoredTimestamp};
    use chrono::TimeZone;
    use uuid::Uuid;

    pub(crate) fn schedule(
        due_date: Option<&str>,
        due_mileage: Option<i64>,
        lead_days: Option<i32>,
        lead_miles: Option<i64>,
    ) -> ServiceSchedule {
        ServiceSchedule {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::nil(),
            service_code: "OIL_CHANGE".into(),
            service_name: "Engine Oil & Filter".into(),
            interval_months: Some(6),
            interval_miles: Some(5_000),
            reminder_lead_days: lead_days,
            reminder_lead_miles: lead_miles,
            next_due_date: due_date.map(StoredDate::new),
            next_due_mileage: due_mileage,
            last_completed_date: None,
            last_completed_mileage: None,
            last_reminder_sent_at: None,
            last_reminder_status: None,
            created_at: StoredTimestamp::new("2023-10-02T09:15:00.000Z"),
            updated_at: StoredTimestamp::new("2023-10-02T09:15:00.000Z"),
        }
    }

    fn june_17() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 17, 14, 0, 0).unwrap()
    }

    #[test]
    fn far_away_schedule_is_ok() {
        let s = schedule(Some("2024-12-01"), Some(60_000), Some(14), Some(500));
        let result = evaluate_schedule(&s, Some(45_210), june_17());
        assert_eq!(result.status, MaintenanceStatus::Ok);
        assert_eq!(result.miles_until_due, Some(14_790));
        assert_eq!(result.due_date_label.as_deref(), Some("Dec 1, 2024"));
    }

    #[test]
    fn due_today_is_overdue() {
        let s = schedule(Some("2024-06-17"), None, Some(14), None);
        let result = evaluate_schedule(&s, None, june_17());
        assert_eq!(result.days_until_due, Some(0));
        assert_eq!(result.status, MaintenanceStatus::Overdue);
    }

    #[test]
    fn mileage_reached_is_overdue_regardless_of_lead() {
        let s = schedule(Some("2025-01-01"), Some(45_000), Some(0), Some(0));
        let result = evaluate_schedule(&s, Some(45_210), june_17());
        assert_eq!(result.miles_until_due, Some(-210));
        assert_eq!(result.status, MaintenanceStatus::Overdue);
    }

    #[test]
    fn inside_lead_days_is_due_soon() {
        let s = schedule(Some("2024-07-01"), Some(50_000), Some(14), Some(500));
        let result = evaluate_schedule(&s, Some(45_210), june_17());
        assert_eq!(result.days_until_due, Some(14));
        assert_eq!(result.status, MaintenanceStatus::DueSoon);
    }

    #[test]
    fn inside_lead_miles_is_due_soon() {
        let s = schedule(None, Some(45_600), None, Some(500));
        let result = evaluate_schedule(&s, Some(45_210), june_17());
        assert_eq!(result.status, MaintenanceStatus::DueSoon);
    }

    #[test]
    fn zero_or_negative_lead_never_triggers_due_soon() {
        let by_days = schedule(Some("2024-06-18"), None, Some(0), None);
        assert_eq!(evaluate_schedule(&by_days, None, june_17()).status, MaintenanceStatus::Ok);

        let by_miles = schedule(None, Some(45_211), None, Some(-100));
        assert_eq!(
            evaluate_schedule(&by_miles, Some(45_210), june_17()).status,
            MaintenanceStatus::Ok
        );
    }

    #[test]
    fn schedule_without_due_point_is_always_ok() {
        let s = schedule(None, None, Some(365), Some(100_000));
        let result = evaluate_schedule(&s, Some(45_210), june_17());
        assert_eq!(result.status, MaintenanceStatus::Ok);
        assert!(result.days_until_due.is_none());
        assert!(result.miles_until_due.is_none());
    }

    #[test]
    fn malformed_due_date_counts_as_absent() {
        let s = schedule(Some("not-a-date"), None, Some(14), None);
        let result = evaluate_schedule(&s, None, june_17());
        assert_eq!(result.status, MaintenanceStatus::Ok);
        assert!(result.due_date_label.is_none());
    }

    #[test]
    fn unknown_vehicle_mileage_disables_mileage_dimension() {
        let s = schedule(None, Some(100), None, Some(500));
        assert!(evaluate_schedule(&s, None, june_17()).miles_until_due.is_none());
        assert!(evaluate_schedule(&s, Some(-1), june_17()).miles_until_due.is_none());
    }

    #[test]
    fn summary_and_preview_labels() {
        let s = schedule(Some("2024-06-18"), Some(45_690), Some(14), Some(500));
        let result = evaluate_schedule(&s, Some(45_210), june_17());
        assert_eq!(
            reminder_summary(&result).as_deref(),
            Some("Due tomorrow • 480 miles remaining")
        );
        assert_eq!(reminder_preview_date(&result).as_deref(), Some("Jun 4, 2024"));

        let overdue = evaluate_schedule(
            &schedule(Some("2024-06-01"), Some(45_000), None, None),
            Some(45_210),
            june_17(),
        );
        assert_eq!(
            reminder_summary(&overdue).as_deref(),
            Some("Due now • Mileage threshold met")
        );

        let unknown = evaluate_schedule(&schedule(None, None, None, None), None, june_17());
        assert!(reminder_summary(&unknown).is_none());
    }
}
