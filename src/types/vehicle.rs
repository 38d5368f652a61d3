//! Vehicle types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::stamp::StoredTimestamp;

/// Vehicle entity - a tracked car owned by a device/account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub device_id: String,
    pub year: Option<i32>,
    pub make: String,
    pub model: String,
    pub vin: Option<String>,
    /// Reminder contact address
    pub contact_email: Option<String>,
    /// Odometer reading in miles
    pub current_mileage: Option<i64>,
    pub last_mileage_confirmed_at: Option<StoredTimestamp>,
    pub last_mileage_reminder_at: Option<StoredTimestamp>,
    pub created_at: StoredTimestamp,
    pub updated_at: StoredTimestamp,
}

impl Vehicle {
    /// "2018 Toyota Camry", skipping empty parts.
    pub fn label(&self) -> String {
        let year = self.year.map(|y| y.to_string());
        [year.as_deref(), Some(self.make.as_str()), Some(self.model.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Non-empty reminder contact, if any.
    pub fn reminder_contact(&self) -> Option<&str> {
        self.contact_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Recorded mileage; negative readings count as unknown.
    pub fn known_mileage(&self) -> Option<i64> {
        self.current_mileage.filter(|m| *m >= 0)
    }
}

/// Request to onboard a new vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehicleRequest {
    pub device_id: String,
    pub year: Option<i32>,
    pub make: String,
    pub model: String,
    pub vin: Option<String>,
    pub contact_email: Option<String>,
    pub current_mileage: Option<i64>,
}

impl CreateVehicleRequest {
    /// Trimmed, lowercased contact address; blank means none.
    pub fn normalized_contact_email(&self) -> Option<String> {
        self.contact_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(str::to_lowercase)
    }

    pub fn normalized_vin(&self) -> Option<String> {
        self.vin
            .as_deref()
            .map(str::trim)
            .filter(|vin| !vin.is_empty())
            .map(str::to_string)
    }
}

/// Request to confirm the current odometer reading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMileageRequest {
    pub vehicle_id: Uuid,
    pub current_mileage: i64,
}

/// Request addressed to a single vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleIdRequest {
    pub vehicle_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(year: Option<i32>, make: &str, model: &str) -> Vehicle {
        Vehicle {
            id: Uuid::nil(),
            device_id: "device-alpha".into(),
            year,
            make: make.into(),
            model: model.into(),
            vin: None,
            contact_email: Some("  ".into()),
            current_mileage: Some(-5),
            last_mileage_confirmed_at: None,
            last_mileage_reminder_at: None,
            created_at: StoredTimestamp::new("2023-10-02T09:15:00.000Z"),
            updated_at: StoredTimestamp::new("2023-10-02T09:15:00.000Z"),
        }
    }

    #[test]
    fn label_joins_known_parts() {
        assert_eq!(vehicle(Some(2018), "Toyota", "Camry").label(), "2018 Toyota Camry");
        assert_eq!(vehicle(None, "Ford", "F-150").label(), "Ford F-150");
        assert_eq!(vehicle(None, "", "").label(), "");
    }

    #[test]
    fn blank_contact_is_none() {
        assert!(vehicle(None, "Honda", "CR-V").reminder_contact().is_none());
    }

    #[test]
    fn negative_mileage_is_unknown() {
        assert!(vehicle(None, "Honda", "CR-V").known_mileage().is_none());
    }

    #[test]
    fn create_request_normalizes_contact() {
        let request = CreateVehicleRequest {
            device_id: "device-alpha".into(),
            year: Some(2018),
            make: "Toyota".into(),
            model: "Camry".into(),
            vin: Some("   ".into()),
            contact_email: Some("  Alex.Tan@Example.com ".into()),
            current_mileage: None,
        };
        assert_eq!(request.normalized_contact_email().as_deref(), Some("alex.tan@example.com"));
        assert!(request.normalized_vin().is_none());
    }
}
