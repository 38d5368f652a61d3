//! Schedule materialization and recurrence.
//!
//! New vehicles get one schedule per template; a completed service moves the
//! due point forward from the service date and mileage, not from the old due
//! point.

use chrono::{DateTime, Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::types::{CompletedService, ServiceSchedule, StoredDate, StoredTimestamp};

/// Template a schedule is materialized from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTemplate {
    pub code: String,
    pub name: String,
    pub interval_miles: Option<i64>,
    pub interval_months: Option<i32>,
    pub reminder_lead_miles: Option<i64>,
    pub reminder_lead_days: Option<i32>,
    /// Odometer reading of the first service when the current mileage is unknown
    pub first_due_mileage: Option<i64>,
}

fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months as u32))
}

/// Build fresh schedules for a vehicle.
///
/// Non-positive intervals and leads become absent. The due date is
/// `reference + interval_months`; the due mileage is `current + interval_miles`
/// when the current mileage is known, else the template's first-due mileage.
pub fn materialize_schedules(
    vehicle_id: Uuid,
    current_mileage: Option<i64>,
    reference: DateTime<Utc>,
    templates: &[ServiceTemplate],
    now: DateTime<Utc>,
) -> Vec<ServiceSchedule> {
    let reference_date = reference.date_naive();
    let current_mileage = current_mileage.filter(|m| *m >= 0);

    templates
        .iter()
        .map(|template| {
            let interval_months = template.interval_months.filter(|m| *m > 0);
            let interval_miles = template.interval_miles.filter(|m| *m > 0);

            let next_due_date = interval_months
                .and_then(|months| add_months(reference_date, months))
                .map(StoredDate::from);

            let first_due = template.first_due_mileage.filter(|m| *m > 0).or(interval_miles);
            let next_due_mileage = match (interval_miles, current_mileage) {
                (Some(interval), Some(current)) => current.checked_add(interval),
                _ => first_due,
            };

            ServiceSchedule {
                id: Uuid::new_v4(),
                vehicle_id,
                service_code: template.code.clone(),
                service_name: template.name.clone(),
                interval_months,
                interval_miles,
                reminder_lead_days: template.reminder_lead_days.filter(|d| *d > 0),
                reminder_lead_miles: template.reminder_lead_miles.filter(|m| *m > 0),
                next_due_date,
                next_due_mileage,
                last_completed_date: None,
                last_completed_mileage: None,
                last_reminder_sent_at: None,
                last_reminder_status: None,
                created_at: StoredTimestamp::from(now),
                updated_at: StoredTimestamp::from(now),
            }
        })
        .collect()
}

/// Roll a schedule forward after a completed service and reset its reminder
/// bookkeeping. Dimensions without an interval (or without a service mileage)
/// keep their previous due point. A due mileage past `i64::MAX` becomes absent.
pub fn apply_completed_service(
    schedule: &mut ServiceSchedule,
    service: &CompletedService,
    now: DateTime<Utc>,
) {
    if let Some(months) = schedule.interval_months.filter(|m| *m > 0) {
        if let Some(next) = add_months(service.service_date, months) {
            schedule.next_due_date = Some(StoredDate::from(next));
        }
    }

    if let (Some(interval), Some(mileage)) = (
        schedule.interval_miles.filter(|m| *m > 0),
        service.mileage.filter(|m| *m >= 0),
    ) {
        schedule.next_due_mileage = mileage.checked_add(interval);
    }

    schedule.last_completed_date = Some(StoredDate::from(service.service_date));
    schedule.last_completed_mileage = service.mileage;
    schedule.last_reminder_sent_at = None;
    schedule.last_reminder_status = None;
    schedule.updated_at = StoredTimestamp::from(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_service_templates;
    use crate::types::MaintenanceStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn template(code: &str) -> ServiceTemplate {
        default_service_templates()
            .into_iter()
            .find(|t| t.code == code)
            .unwrap()
    }

    #[test]
    fn known_mileage_offsets_from_current() {
        let reference = Utc.with_ymd_and_hms(2023, 10, 2, 9, 15, 0).unwrap();
        let schedules = materialize_schedules(Uuid::nil(), Some(45_210), reference, &[template("oil_change")], now());
        let oil = &schedules[0];
        assert_eq!(oil.next_due_mileage, Some(50_210));
        assert_eq!(oil.next_due_date, Some(StoredDate::new("2024-04-02")));
        assert_eq!(oil.reminder_lead_days, Some(14));
        assert!(oil.last_reminder_sent_at.is_none());
    }

    #[test]
    fn unknown_mileage_uses_first_due() {
        let schedules = materialize_schedules(Uuid::nil(), None, now(), &[template("tire_rotation")], now());
        assert_eq!(schedules[0].next_due_mileage, Some(6_000));
    }

    #[test]
    fn zero_lead_and_missing_interval_become_absent() {
        let schedules = materialize_schedules(Uuid::nil(), Some(10_000), now(), &[template("brake_inspection")], now());
        let brakes = &schedules[0];
        assert!(brakes.interval_miles.is_none());
        assert!(brakes.next_due_mileage.is_none());
        assert!(brakes.reminder_lead_miles.is_none());
        assert_eq!(brakes.next_due_date, Some(StoredDate::new("2025-06-01")));
    }

    #[test]
    fn month_end_reference_clamps() {
        let reference = Utc.with_ymd_and_hms(2023, 8, 31, 0, 0, 0).unwrap();
        let schedules = materialize_schedules(Uuid::nil(), None, reference, &[template("oil_change")], now());
        assert_eq!(schedules[0].next_due_date, Some(StoredDate::new("2024-02-29")));
    }

    #[test]
    fn completed_service_recomputes_from_service_point() {
        let mut schedule = materialize_schedules(Uuid::nil(), Some(41_000), now(), &[template("oil_change")], now())
            .remove(0);
        schedule.last_reminder_sent_at = Some(StoredTimestamp::new("2024-06-17T14:00:00.000Z"));
        schedule.last_reminder_status = Some(MaintenanceStatus::DueSoon);

        let service = CompletedService {
            service_date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            mileage: Some(46_100),
            cost_cents: Some(8_500),
            notes: None,
        };
        apply_completed_service(&mut schedule, &service, now());

        assert_eq!(schedule.next_due_date, Some(StoredDate::new("2025-01-03")));
        assert_eq!(schedule.next_due_mileage, Some(51_100));
        assert_eq!(schedule.last_completed_date, Some(StoredDate::new("2024-07-03")));
        assert_eq!(schedule.last_completed_mileage, Some(46_100));
        assert!(schedule.last_reminder_sent_at.is_none());
        assert!(schedule.last_reminder_status.is_none());
    }

    #[test]
    fn completed_service_without_mileage_keeps_due_mileage() {
        let mut schedule = materialize_schedules(Uuid::nil(), Some(41_000), now(), &[template("oil_change")], now())
            .remove(0);
        let service = CompletedService {
            service_date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            mileage: None,
            cost_cents: None,
            notes: None,
        };
        apply_completed_service(&mut schedule, &service, now());
        assert_eq!(schedule.next_due_mileage, Some(46_000));
    }

    #[test]
    fn mileage_overflow_leaves_due_mileage_absent() {
        let schedules =
            materialize_schedules(Uuid::nil(), Some(i64::MAX - 10), now(), &[template("oil_change")], now());
        let mut oil = schedules.into_iter().next().unwrap();
        assert!(oil.next_due_mileage.is_none());
        assert_eq!(oil.next_due_date, Some(StoredDate::new("2024-12-01")));

        oil.next_due_mileage = Some(46_000);
        let service = CompletedService {
            service_date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            mileage: Some(i64::MAX),
            cost_cents: None,
            notes: None,
        };
        apply_completed_service(&mut oil, &service, now());
        assert!(oil.next_due_mileage.is_none());
        assert_eq!(oil.last_completed_mileage, Some(i64::MAX));
    }

    #[test]
    fn all_default_templates_materialize() {
        let templates = default_service_templates();
        let schedules = materialize_schedules(Uuid::nil(), Some(0), now(), &templates, now());
        assert_eq!(schedules.len(), templates.len());
        assert!(schedules.iter().all(|s| s.next_due_date.is_some()));
    }
}
