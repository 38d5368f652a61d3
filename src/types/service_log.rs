//! Completed service history

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::stamp::{StoredDate, StoredTimestamp};

/// Append-only record of a completed service
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLog {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    /// None for ad-hoc services
    pub schedule_id: Option<Uuid>,
    pub service_code: Option<String>,
    pub service_name: String,
    pub service_date: StoredDate,
    pub mileage: Option<i64>,
    pub cost_cents: Option<i64>,
    pub notes: Option<String>,
    pub created_at: StoredTimestamp,
}

/// A completed service as handed to the repository
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedService {
    pub service_date: NaiveDate,
    pub mileage: Option<i64>,
    pub cost_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Request to log a service. `schedule_id = None` logs a custom service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogServiceRequest {
    pub vehicle_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub custom_service_name: Option<String>,
    pub service_date: NaiveDate,
    pub mileage: Option<i64>,
    /// Cost in dollars
    pub cost: Option<f64>,
    pub notes: Option<String>,
}

impl LogServiceRequest {
    pub fn completed_service(&self) -> CompletedService {
        CompletedService {
            service_date: self.service_date,
            mileage: self.mileage.filter(|m| *m >= 0),
            cost_cents: self
                .cost
                .filter(|c| c.is_finite())
                .map(|c| (c * 100.0).round() as i64),
            notes: self
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(cost: Option<f64>, notes: Option<&str>) -> LogServiceRequest {
        LogServiceRequest {
            vehicle_id: Uuid::nil(),
            schedule_id: None,
            custom_service_name: Some("Bed Liner Installation".into()),
            service_date: NaiveDate::from_ymd_opt(2023, 8, 12).unwrap(),
            mileage: Some(15_000),
            cost,
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn cost_is_rounded_to_cents() {
        let service = request(Some(85.0), None).completed_service();
        assert_eq!(service.cost_cents, Some(8500));
        let service = request(Some(40.5), None).completed_service();
        assert_eq!(service.cost_cents, Some(4050));
    }

    #[test]
    fn non_finite_cost_is_dropped() {
        assert_eq!(request(Some(f64::NAN), None).completed_service().cost_cents, None);
    }

    #[test]
    fn blank_notes_are_dropped() {
        assert_eq!(request(None, Some("   ")).completed_service().notes, None);
        assert_eq!(
            request(None, Some(" Spray-in liner ")).completed_service().notes.as_deref(),
            Some("Spray-in liner")
        );
    }
}
