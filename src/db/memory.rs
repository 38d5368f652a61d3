//! In-process repository used for local runs (`DATA_SOURCE=memory`) and tests.
//!
//! Mirrors the semantics of the PostgreSQL queries, including the conditional
//! reminder claims.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::db::repository::{MaintenanceRepository, RepoResult, RepositoryError};
use crate::services::recurrence::{apply_completed_service, materialize_schedules, ServiceTemplate};
use crate::types::{
    CompletedService, CreateVehicleRequest, MaintenanceStatus, ReminderBookkeeping, ServiceLog,
    ServiceSchedule, StoredDate, StoredTimestamp, Vehicle,
};

pub const SEED_ALPHA_VEHICLE: Uuid = Uuid::from_u128(0x0a1f_0000_0000_4000_8000_0000_0000_0001);
pub const SEED_BETA_VEHICLE: Uuid = Uuid::from_u128(0x0b3e_0000_0000_4000_8000_0000_0000_0002);
pub const SEED_GAMMA_VEHICLE: Uuid = Uuid::from_u128(0x0c4a_0000_0000_4000_8000_0000_0000_0003);

pub const SEED_ALPHA_OIL: Uuid = Uuid::from_u128(0x0a1f_0000_0000_4000_8000_0000_0001_0001);
pub const SEED_ALPHA_TIRES: Uuid = Uuid::from_u128(0x0a1f_0000_0000_4000_8000_0000_0001_0002);
pub const SEED_BETA_BRAKES: Uuid = Uuid::from_u128(0x0b3e_0000_0000_4000_8000_0000_0001_0001);
pub const SEED_GAMMA_TRANSMISSION: Uuid = Uuid::from_u128(0x0c4a_0000_0000_4000_8000_0000_0001_0001);
pub const SEED_GAMMA_CABIN: Uuid = Uuid::from_u128(0x0c4a_0000_0000_4000_8000_0000_0001_0002);

#[derive(Default)]
struct Store {
    vehicles: Vec<Vehicle>,
    schedules: Vec<ServiceSchedule>,
    logs: Vec<ServiceLog>,
}

impl Store {
    fn vehicle_mut(&mut self, vehicle_id: Uuid) -> RepoResult<&mut Vehicle> {
        self.vehicles
            .iter_mut()
            .find(|v| v.id == vehicle_id)
            .ok_or(RepositoryError::NotFound { entity: "vehicle", id: vehicle_id })
    }

    fn schedule_mut(&mut self, schedule_id: Uuid) -> RepoResult<&mut ServiceSchedule> {
        self.schedules
            .iter_mut()
            .find(|s| s.id == schedule_id)
            .ok_or(RepositoryError::NotFound { entity: "schedule", id: schedule_id })
    }

    /// Log-driven mileage only moves forward
    fn raise_mileage(&mut self, vehicle_id: Uuid, mileage: i64, now: DateTime<Utc>) -> RepoResult<()> {
        let vehicle = self.vehicle_mut(vehicle_id)?;
        if vehicle.current_mileage.map_or(true, |current| current < mileage) {
            set_confirmed_mileage(vehicle, mileage, now);
        }
        Ok(())
    }
}

fn set_confirmed_mileage(vehicle: &mut Vehicle, mileage: i64, now: DateTime<Utc>) {
    let stamp = StoredTimestamp::from(now);
    vehicle.current_mileage = Some(mileage);
    vehicle.last_mileage_confirmed_at = Some(stamp.clone());
    vehicle.last_mileage_reminder_at = None;
    vehicle.updated_at = stamp;
}

pub struct MemoryRepository {
    store: RwLock<Store>,
    offline: AtomicBool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_store(Store::default())
    }

    fn with_store(store: Store) -> Self {
        Self { store: RwLock::new(store), offline: AtomicBool::new(false) }
    }

    /// Repository preloaded with three sample vehicles and their history
    pub fn seeded() -> Self {
        let store = Store {
            vehicles: seed_vehicles(),
            schedules: seed_schedules(),
            logs: seed_logs(),
        };
        Self::with_store(store)
    }

    /// Insert fully-formed rows, bypassing onboarding
    pub fn insert_vehicle(&self, vehicle: Vehicle) {
        self.store.write().vehicles.push(vehicle);
    }

    pub fn insert_schedule(&self, schedule: ServiceSchedule) {
        self.store.write().schedules.push(schedule);
    }

    /// Make every operation fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> RepoResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MaintenanceRepository for MemoryRepository {
    async fn list_vehicles_with_contact(&self) -> RepoResult<Vec<Vehicle>> {
        self.ensure_online()?;
        let store = self.store.read();
        Ok(store
            .vehicles
            .iter()
            .filter(|v| v.reminder_contact().is_some())
            .cloned()
            .collect())
    }

    async fn get_vehicle(&self, vehicle_id: Uuid) -> RepoResult<Option<Vehicle>> {
        self.ensure_online()?;
        Ok(self.store.read().vehicles.iter().find(|v| v.id == vehicle_id).cloned())
    }

    async fn create_vehicle(
        &self,
        request: &CreateVehicleRequest,
        templates: &[ServiceTemplate],
        now: DateTime<Utc>,
    ) -> RepoResult<Vehicle> {
        self.ensure_online()?;
        let make = request.make.trim();
        let model = request.model.trim();
        if make.is_empty() || model.is_empty() {
            return Err(RepositoryError::Invalid("make and model are required".into()));
        }

        let stamp = StoredTimestamp::from(now);
        let mileage = request.current_mileage.filter(|m| *m >= 0);
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            device_id: request.device_id.clone(),
            year: request.year,
            make: make.to_string(),
            model: model.to_string(),
            vin: request.normalized_vin(),
            contact_email: request.normalized_contact_email(),
            current_mileage: mileage,
            last_mileage_confirmed_at: mileage.map(|_| stamp.clone()),
            last_mileage_reminder_at: None,
            created_at: stamp.clone(),
            updated_at: stamp,
        };

        let schedules = materialize_schedules(vehicle.id, mileage, now, templates, now);

        let mut store = self.store.write();
        store.vehicles.push(vehicle.clone());
        store.schedules.extend(schedules);

        Ok(vehicle)
    }

    async fn list_schedules_for_vehicle(&self, vehicle_id: Uuid) -> RepoResult<Vec<ServiceSchedule>> {
        self.ensure_online()?;
        let store = self.store.read();
        let mut schedules: Vec<ServiceSchedule> = store
            .schedules
            .iter()
            .filter(|s| s.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| {
            let a_date = a.next_due_date.as_ref().map(StoredDate::as_str);
            let b_date = b.next_due_date.as_ref().map(StoredDate::as_str);
            (a_date.is_none(), a_date, &a.service_name).cmp(&(b_date.is_none(), b_date, &b.service_name))
        });
        Ok(schedules)
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> RepoResult<Option<ServiceSchedule>> {
        self.ensure_online()?;
        Ok(self.store.read().schedules.iter().find(|s| s.id == schedule_id).cloned())
    }

    async fn ensure_schedules_exist(
        &self,
        vehicle: &Vehicle,
        templates: &[ServiceTemplate],
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.ensure_online()?;
        let mut store = self.store.write();
        if !store.vehicles.iter().any(|v| v.id == vehicle.id) {
            return Err(RepositoryError::NotFound { entity: "vehicle", id: vehicle.id });
        }
        if store.schedules.iter().any(|s| s.vehicle_id == vehicle.id) {
            return Ok(false);
        }

        let reference = vehicle.created_at.parse().unwrap_or(now);
        let schedules = materialize_schedules(vehicle.id, vehicle.known_mileage(), reference, templates, now);
        let created = !schedules.is_empty();
        store.schedules.extend(schedules);

        Ok(created)
    }

    async fn list_service_logs(&self, vehicle_id: Uuid) -> RepoResult<Vec<ServiceLog>> {
        self.ensure_online()?;
        let store = self.store.read();
        let mut logs: Vec<ServiceLog> = store
            .logs
            .iter()
            .filter(|l| l.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| {
            (b.service_date.as_str(), b.created_at.as_str()).cmp(&(a.service_date.as_str(), a.created_at.as_str()))
        });
        Ok(logs)
    }

    async fn record_completed_service(
        &self,
        schedule_id: Uuid,
        service: &CompletedService,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceLog> {
        self.ensure_online()?;
        let mut store = self.store.write();

        let schedule = store.schedule_mut(schedule_id)?;
        apply_completed_service(schedule, service, now);
        let log = new_log(
            schedule.vehicle_id,
            Some(schedule.id),
            Some(schedule.service_code.clone()),
            schedule.service_name.clone(),
            service,
            now,
        );

        if let Some(mileage) = service.mileage {
            store.raise_mileage(log.vehicle_id, mileage, now)?;
        }
        store.logs.push(log.clone());

        Ok(log)
    }

    async fn record_custom_service(
        &self,
        vehicle_id: Uuid,
        service_name: &str,
        service: &CompletedService,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceLog> {
        self.ensure_online()?;
        let service_name = service_name.trim();
        if service_name.is_empty() {
            return Err(RepositoryError::Invalid("service name is required".into()));
        }

        let mut store = self.store.write();
        store.vehicle_mut(vehicle_id)?;

        let log = new_log(vehicle_id, None, None, service_name.to_string(), service, now);
        if let Some(mileage) = service.mileage {
            store.raise_mileage(vehicle_id, mileage, now)?;
        }
        store.logs.push(log.clone());

        Ok(log)
    }

    async fn update_vehicle_mileage(
        &self,
        vehicle_id: Uuid,
        mileage: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Vehicle> {
        self.ensure_online()?;
        if mileage < 0 {
            return Err(RepositoryError::Invalid("mileage must be non-negative".into()));
        }
        let mut store = self.store.write();
        let vehicle = store.vehicle_mut(vehicle_id)?;
        set_confirmed_mileage(vehicle, mileage, now);
        Ok(vehicle.clone())
    }

    async fn update_schedule_due_date(
        &self,
        schedule_id: Uuid,
        next_due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> RepoResult<ServiceSchedule> {
        self.ensure_online()?;
        let mut store = self.store.write();
        let schedule = store.schedule_mut(schedule_id)?;
        schedule.next_due_date = Some(StoredDate::from(next_due_date));
        schedule.updated_at = StoredTimestamp::from(now);
        Ok(schedule.clone())
    }

    async fn claim_schedule_reminder(
        &self,
        schedule_id: Uuid,
        status: MaintenanceStatus,
        sent_at: DateTime<Utc>,
        previous: &ReminderBookkeeping,
    ) -> RepoResult<bool> {
        self.ensure_online()?;
        let mut store = self.store.write();
        let Some(schedule) = store.schedules.iter_mut().find(|s| s.id == schedule_id) else {
            return Ok(false);
        };
        if schedule.last_reminder_sent_at != previous.sent_at {
            return Ok(false);
        }

        let stamp = StoredTimestamp::from(sent_at);
        schedule.last_reminder_sent_at = Some(stamp.clone());
        schedule.last_reminder_status = Some(status);
        schedule.updated_at = stamp;
        Ok(true)
    }

    async fn release_schedule_reminder(
        &self,
        schedule_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: &ReminderBookkeeping,
    ) -> RepoResult<()> {
        self.ensure_online()?;
        let mut store = self.store.write();
        let claimed = Some(StoredTimestamp::from(claimed_at));
        if let Some(schedule) = store
            .schedules
            .iter_mut()
            .find(|s| s.id == schedule_id && s.last_reminder_sent_at == claimed)
        {
            schedule.last_reminder_sent_at = previous.sent_at.clone();
            schedule.last_reminder_status = previous.status;
        }
        Ok(())
    }

    async fn claim_mileage_reminder(
        &self,
        vehicle_id: Uuid,
        sent_at: DateTime<Utc>,
        previous: Option<&StoredTimestamp>,
    ) -> RepoResult<bool> {
        self.ensure_online()?;
        let mut store = self.store.write();
        let Some(vehicle) = store.vehicles.iter_mut().find(|v| v.id == vehicle_id) else {
            return Ok(false);
        };
        if vehicle.last_mileage_reminder_at.as_ref() != previous {
            return Ok(false);
        }

        let stamp = StoredTimestamp::from(sent_at);
        vehicle.last_mileage_reminder_at = Some(stamp.clone());
        vehicle.updated_at = stamp;
        Ok(true)
    }

    async fn release_mileage_reminder(
        &self,
        vehicle_id: Uuid,
        claimed_at: DateTime<Utc>,
        previous: Option<&StoredTimestamp>,
    ) -> RepoResult<()> {
        self.ensure_online()?;
        let mut store = self.store.write();
        let claimed = Some(StoredTimestamp::from(claimed_at));
        if let Some(vehicle) = store
            .vehicles
            .iter_mut()
            .find(|v| v.id == vehicle_id && v.last_mileage_reminder_at == claimed)
        {
            vehicle.last_mileage_reminder_at = previous.cloned();
        }
        Ok(())
    }
}

fn new_log(
    vehicle_id: Uuid,
    schedule_id: Option<Uuid>,
    service_code: Option<String>,
    service_name: String,
    service: &CompletedService,
    now: DateTime<Utc>,
) -> ServiceLog {
    ServiceLog {
        id: Uuid::new_v4(),
        vehicle_id,
        schedule_id,
        service_code,
        service_name,
        service_date: StoredDate::from(service.service_date),
        mileage: service.mileage,
        cost_cents: service.cost_cents,
        notes: service.notes.clone(),
        created_at: StoredTimestamp::from(now),
    }
}

// ==========================================================================
// Sample data
// ==========================================================================

#[allow(clippy::too_many_arguments)]
fn seed_vehicle(
    id: Uuid,
    device_id: &str,
    year: i32,
    make: &str,
    model: &str,
    vin: &str,
    contact_email: Option<&str>,
    current_mileage: i64,
    confirmed_at: &str,
    reminder_at: Option<&str>,
    created_at: &str,
) -> Vehicle {
    Vehicle {
        id,
        device_id: device_id.to_string(),
        year: Some(year),
        make: make.to_string(),
        model: model.to_string(),
        vin: Some(vin.to_string()),
        contact_email: contact_email.map(str::to_string),
        current_mileage: Some(current_mileage),
        last_mileage_confirmed_at: Some(StoredTimestamp::new(confirmed_at)),
        last_mileage_reminder_at: reminder_at.map(StoredTimestamp::new),
        created_at: StoredTimestamp::new(created_at),
        updated_at: StoredTimestamp::new(confirmed_at),
    }
}

fn seed_vehicles() -> Vec<Vehicle> {
    vec![
        seed_vehicle(
            SEED_ALPHA_VEHICLE,
            "device-alpha",
            2018,
            "Toyota",
            "Camry",
            "4T1BF1FK0JU123456",
            Some("alex.tan@example.com"),
            45_210,
            "2024-05-04T15:45:00.000Z",
            Some("2024-04-15T10:30:00.000Z"),
            "2023-10-02T09:15:00.000Z",
        ),
        seed_vehicle(
            SEED_BETA_VEHICLE,
            "device-beta",
            2021,
            "Ford",
            "F-150",
            "1FTFW1E58MFA12345",
            None,
            23_650,
            "2024-04-21T11:00:00.000Z",
            None,
            "2022-06-12T13:10:00.000Z",
        ),
        seed_vehicle(
            SEED_GAMMA_VEHICLE,
            "device-gamma",
            2015,
            "Honda",
            "CR-V",
            "2HKRM4H77FH123456",
            Some("nina.fernandez@example.com"),
            98_210,
            "2024-03-30T08:20:00.000Z",
            Some("2024-02-28T07:50:00.000Z"),
            "2021-01-20T16:40:00.000Z",
        ),
    ]
}

struct SeedSchedule {
    id: Uuid,
    vehicle_id: Uuid,
    code: &'static str,
    name: &'static str,
    interval: (i32, i64),
    lead: (i32, i64),
    next_due: (&'static str, i64),
    last_completed: (&'static str, i64),
    reminder: Option<(&'static str, MaintenanceStatus)>,
    created_at: &'static str,
    updated_at: &'static str,
}

impl From<SeedSchedule> for ServiceSchedule {
    fn from(seed: SeedSchedule) -> Self {
        ServiceSchedule {
            id: seed.id,
            vehicle_id: seed.vehicle_id,
            service_code: seed.code.to_string(),
            service_name: seed.name.to_string(),
            interval_months: Some(seed.interval.0),
            interval_miles: Some(seed.interval.1),
            reminder_lead_days: Some(seed.lead.0),
            reminder_lead_miles: Some(seed.lead.1),
            next_due_date: Some(StoredDate::new(seed.next_due.0)),
            next_due_mileage: Some(seed.next_due.1),
            last_completed_date: Some(StoredDate::new(seed.last_completed.0)),
            last_completed_mileage: Some(seed.last_completed.1),
            last_reminder_sent_at: seed.reminder.map(|(at, _)| StoredTimestamp::new(at)),
            last_reminder_status: seed.reminder.map(|(_, status)| status),
            created_at: StoredTimestamp::new(seed.created_at),
            updated_at: StoredTimestamp::new(seed.updated_at),
        }
    }
}

fn seed_schedules() -> Vec<ServiceSchedule> {
    vec![
        SeedSchedule {
            id: SEED_ALPHA_OIL,
            vehicle_id: SEED_ALPHA_VEHICLE,
            code: "OIL_CHANGE",
            name: "Engine Oil & Filter",
            interval: (6, 5_000),
            lead: (14, 500),
            next_due: ("2024-07-01", 50_000),
            last_completed: ("2024-01-03", 41_000),
            reminder: Some(("2024-06-17T14:00:00.000Z", MaintenanceStatus::DueSoon)),
            created_at: "2023-10-02T09:15:00.000Z",
            updated_at: "2024-06-17T14:00:00.000Z",
        },
        SeedSchedule {
            id: SEED_ALPHA_TIRES,
            vehicle_id: SEED_ALPHA_VEHICLE,
            code: "TIRE_ROTATION",
            name: "Tire Rotation",
            interval: (6, 6_000),
            lead: (21, 600),
            next_due: ("2024-08-15", 51_200),
            last_completed: ("2024-02-10", 43_000),
            reminder: None,
            created_at: "2023-10-02T09:15:00.000Z",
            updated_at: "2024-02-10T09:50:00.000Z",
        },
        SeedSchedule {
            id: SEED_BETA_BRAKES,
            vehicle_id: SEED_BETA_VEHICLE,
            code: "BRAKE_INSPECTION",
            name: "Brake Inspection",
            interval: (12, 12_000),
            lead: (30, 900),
            next_due: ("2024-05-05", 25_000),
            last_completed: ("2023-05-01", 12_000),
            reminder: Some(("2024-04-05T10:00:00.000Z", MaintenanceStatus::Overdue)),
            created_at: "2022-06-12T13:10:00.000Z",
            updated_at: "2024-04-05T10:00:00.000Z",
        },
        SeedSchedule {
            id: SEED_GAMMA_TRANSMISSION,
            vehicle_id: SEED_GAMMA_VEHICLE,
            code: "TRANSMISSION_SERVICE",
            name: "Transmission Fluid Service",
            interval: (36, 36_000),
            lead: (30, 1_500),
            next_due: ("2025-11-15", 108_000),
            last_completed: ("2022-11-20", 72_000),
            reminder: None,
            created_at: "2021-01-20T16:40:00.000Z",
            updated_at: "2022-11-20T16:40:00.000Z",
        },
        SeedSchedule {
            id: SEED_GAMMA_CABIN,
            vehicle_id: SEED_GAMMA_VEHICLE,
            code: "CABIN_FILTER",
            name: "Cabin Air Filter Replacement",
            interval: (12, 15_000),
            lead: (21, 750),
            next_due: ("2024-03-01", 99_000),
            last_completed: ("2023-03-01", 84_000),
            reminder: Some(("2024-02-10T09:00:00.000Z", MaintenanceStatus::Overdue)),
            created_at: "2021-01-20T16:40:00.000Z",
            updated_at: "2024-02-10T09:00:00.000Z",
        },
    ]
    .into_iter()
    .map(ServiceSchedule::from)
    .collect()
}

#[allow(clippy::too_many_arguments)]
fn seed_log(
    vehicle_id: Uuid,
    schedule_id: Option<Uuid>,
    service_code: Option<&str>,
    service_name: &str,
    service_date: &str,
    mileage: i64,
    cost_cents: i64,
    notes: &str,
    created_at: &str,
) -> ServiceLog {
    ServiceLog {
        id: Uuid::new_v4(),
        vehicle_id,
        schedule_id,
        service_code: service_code.map(str::to_string),
        service_name: service_name.to_string(),
        service_date: StoredDate::new(service_date),
        mileage: Some(mileage),
        cost_cents: Some(cost_cents),
        notes: Some(notes.to_string()),
        created_at: StoredTimestamp::new(created_at),
    }
}

fn seed_logs() -> Vec<ServiceLog> {
    vec![
        seed_log(
            SEED_ALPHA_VEHICLE,
            Some(SEED_ALPHA_OIL),
            Some("OIL_CHANGE"),
            "Engine Oil & Filter",
            "2024-01-03",
            41_000,
            8_500,
            "Used synthetic oil. Checked fluids.",
            "2024-01-03T16:00:00.000Z",
        ),
        seed_log(
            SEED_ALPHA_VEHICLE,
            Some(SEED_ALPHA_TIRES),
            Some("TIRE_ROTATION"),
            "Tire Rotation",
            "2024-02-10",
            43_000,
            4_000,
            "Rotated and balanced tires.",
            "2024-02-10T18:20:00.000Z",
        ),
        seed_log(
            SEED_BETA_VEHICLE,
            None,
            None,
            "Bed Liner Installation",
            "2023-08-12",
            15_000,
            28_000,
            "Spray-in liner upgrade.",
            "2023-08-12T15:10:00.000Z",
        ),
        seed_log(
            SEED_GAMMA_VEHICLE,
            Some(SEED_GAMMA_CABIN),
            Some("CABIN_FILTER"),
            "Cabin Air Filter Replacement",
            "2023-03-01",
            84_000,
            3_500,
            "Replaced filter and cleaned vents.",
            "2023-03-01T13:45:00.000Z",
        ),
    ]
}
