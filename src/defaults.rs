use crate::services::recurrence::ServiceTemplate;

pub const DEFAULT_REMINDER_REPEAT_HOURS: u32 = 24;
pub const DEFAULT_MILEAGE_STALE_DAYS: u32 = 30;
pub const DEFAULT_TRIGGER_TIMEOUT_MS: u64 = 35_000;
pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";

pub const SERVICE_LOG_PATH: &str = "/service/new";
pub const MILEAGE_UPDATE_PATH: &str = "/vehicle/mileage";

/// Generic maintenance plan used when no manufacturer plan is available.
pub fn default_service_templates() -> Vec<ServiceTemplate> {
    const T: &[(&str, &str, Option<i64>, Option<i32>, Option<i64>, Option<i32>)] = &[
        // code, name, interval miles, interval months, lead miles, lead days
        ("oil_change", "Oil Change", Some(5_000), Some(6), Some(500), Some(14)),
        ("tire_rotation", "Tire Rotation", Some(6_000), Some(6), Some(500), Some(14)),
        ("brake_inspection", "Brake Inspection", None, Some(12), Some(0), Some(30)),
        ("engine_air_filter", "Replace Engine Air Filter", Some(15_000), Some(24), Some(1_000), Some(30)),
        ("cabin_air_filter", "Replace Cabin Air Filter", Some(15_000), Some(12), Some(1_000), Some(21)),
        ("brake_fluid_flush", "Brake Fluid Flush", None, Some(24), None, Some(21)),
        ("coolant_service", "Coolant Flush & Replace", Some(60_000), Some(60), Some(1_000), Some(45)),
        ("transmission_service", "Transmission Fluid Service", Some(60_000), Some(60), Some(1_000), Some(45)),
        ("spark_plug_replacement", "Replace Spark Plugs", Some(100_000), Some(72), Some(5_000), Some(45)),
        ("battery_check", "Battery & Charging System Check", None, Some(12), None, Some(14)),
        ("wiper_blade_replacement", "Replace Wiper Blades", None, Some(12), None, Some(14)),
    ];

    T.iter()
        .map(|&(code, name, interval_miles, interval_months, lead_miles, lead_days)| ServiceTemplate {
            code: code.to_string(),
            name: name.to_string(),
            interval_miles,
            interval_months,
            reminder_lead_miles: lead_miles,
            reminder_lead_days: lead_days,
            first_due_mileage: interval_miles.filter(|m| *m > 0),
        })
        .collect()
}
