//! Maintenance timeline: upcoming schedules followed by completed services.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::services::due_status::UpcomingService;
use crate::services::labels::{format_cost_cents, format_display_date, format_miles};
use crate::types::{MaintenanceStatus, ServiceLog};

/// One item of the timeline feed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimelineEntry {
    #[serde(rename_all = "camelCase")]
    Upcoming {
        id: String,
        schedule_id: Uuid,
        title: String,
        due_date: Option<NaiveDate>,
        date_label: Option<String>,
        due_mileage: Option<i64>,
        mileage_label: Option<String>,
        status: MaintenanceStatus,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        id: String,
        log_id: Uuid,
        schedule_id: Option<Uuid>,
        title: String,
        service_date: Option<NaiveDate>,
        date_label: Option<String>,
        mileage: Option<i64>,
        mileage_label: Option<String>,
        cost_cents: Option<i64>,
        cost_label: Option<String>,
        notes: Option<String>,
    },
}

impl TimelineEntry {
    /// Due date for upcoming items, service date for completed ones.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            TimelineEntry::Upcoming { due_date, .. } => *due_date,
            TimelineEntry::Completed { service_date, .. } => *service_date,
        }
    }
}

/// Concatenate upcoming entries (input order) and completed entries (input order).
/// Entries are not interleaved by date.
pub fn build_timeline(upcoming: &[UpcomingService], logs: &[ServiceLog]) -> Vec<TimelineEntry> {
    let upcoming_entries = upcoming.iter().map(|item| {
        let due_mileage = item.schedule.next_due_mileage;
        TimelineEntry::Upcoming {
            id: format!("upcoming-{}", item.schedule.id),
            schedule_id: item.schedule.id,
            title: item.schedule.service_name.clone(),
            due_date: item.due_date,
            date_label: item.due_date_label.clone(),
            due_mileage,
            mileage_label: due_mileage.map(format_miles),
            status: item.status,
        }
    });

    let completed_entries = logs.iter().map(|log| {
        let service_date = log.service_date.parse();
        TimelineEntry::Completed {
            id: format!("log-{}", log.id),
            log_id: log.id,
            schedule_id: log.schedule_id,
            title: log.service_name.clone(),
            service_date,
            date_label: service_date.map(format_display_date),
            mileage: log.mileage,
            mileage_label: log.mileage.map(format_miles),
            cost_cents: log.cost_cents,
            cost_label: log.cost_cents.map(format_cost_cents),
            notes: log.notes.clone(),
        }
    });

    upcoming_entries.chain(completed_entries).collect()
}

/// Most recent completed service by service date; the earlier entry wins ties.
pub fn last_service(logs: &[ServiceLog]) -> Option<&ServiceLog> {
    logs.iter().fold(None, |latest: Option<&ServiceLog>, current| match latest {
        Some(best) if best.service_date.parse() >= current.service_date.parse() => Some(best),
        _ => Some(current),
    })
}
