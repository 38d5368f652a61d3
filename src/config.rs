//! Configuration management

use anyhow::{self, Context, Result};

use crate::defaults::{
    DEFAULT_APP_BASE_URL, DEFAULT_MILEAGE_STALE_DAYS, DEFAULT_REMINDER_REPEAT_HOURS,
    DEFAULT_TRIGGER_TIMEOUT_MS,
};

/// Where schedules, vehicles and logs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Postgres { database_url: String },
    /// Seeded in-memory store for local runs
    Memory,
}

/// Email transport selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTransport {
    Resend { api_key: String },
    /// Log rendered emails instead of delivering them. Only on `EMAIL_TRANSPORT=log`.
    Log,
    /// No `RESEND_API_KEY` and no explicit log transport: reminder runs fail
    Unconfigured,
}

/// Reminder cadence knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSettings {
    /// Minimum hours before an unresolved reminder is re-sent
    pub repeat_hours: u32,
    /// Days after the last mileage confirmation before nudging
    pub mileage_stale_days: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            repeat_hours: DEFAULT_REMINDER_REPEAT_HOURS,
            mileage_stale_days: DEFAULT_MILEAGE_STALE_DAYS,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    pub data_source: DataSource,

    /// Shared secret the reminder trigger must present
    pub reminder_cron_secret: Option<String>,

    /// Sender address for reminder emails
    pub reminder_from_email: Option<String>,

    pub email_transport: EmailTransport,

    /// Base URL for links inside reminder emails
    pub app_base_url: String,

    pub reminders: ReminderSettings,

    /// Request timeout used by the `trigger` command
    pub trigger_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nats_url = get("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let data_source = match get("DATA_SOURCE").as_deref().map(str::trim) {
            Some("memory") | Some("local") => DataSource::Memory,
            Some("postgres") | Some("") | None => DataSource::Postgres {
                database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            },
            Some(other) => anyhow::bail!("Unknown DATA_SOURCE '{}' (expected postgres or memory)", other),
        };

        let explicit_log = get("EMAIL_TRANSPORT").is_some_and(|t| t.trim().eq_ignore_ascii_case("log"));
        let email_transport = match get("RESEND_API_KEY").filter(|k| !k.trim().is_empty()) {
            _ if explicit_log => EmailTransport::Log,
            Some(api_key) => EmailTransport::Resend { api_key },
            None => EmailTransport::Unconfigured,
        };

        let reminder_cron_secret = get("REMINDER_CRON_SECRET").filter(|s| !s.is_empty());
        if reminder_cron_secret.is_none() {
            tracing::warn!("REMINDER_CRON_SECRET not set - reminder trigger will be rejected");
        }

        Ok(Self {
            nats_url,
            data_source,
            reminder_cron_secret,
            reminder_from_email: get("REMINDER_FROM_EMAIL").filter(|s| !s.trim().is_empty()),
            email_transport,
            app_base_url: get("REMINDER_APP_BASE_URL").unwrap_or_else(|| DEFAULT_APP_BASE_URL.to_string()),
            reminders: ReminderSettings {
                repeat_hours: positive_or_default(
                    get("REMINDER_REPEAT_HOURS").as_deref(),
                    DEFAULT_REMINDER_REPEAT_HOURS,
                ),
                mileage_stale_days: positive_or_default(
                    get("MILEAGE_STALE_DAYS").as_deref(),
                    DEFAULT_MILEAGE_STALE_DAYS,
                ),
            },
            trigger_timeout_ms: positive_or_default(
                get("REMINDER_CRON_TIMEOUT_MS").as_deref(),
                DEFAULT_TRIGGER_TIMEOUT_MS,
            ),
        })
    }
}

/// Parse a positive integer; absent, zero, negative or garbage yields `default`.
pub fn positive_or_default<T>(raw: Option<&str>, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_positive_or_default() {
        assert_eq!(positive_or_default(None, 24u32), 24);
        assert_eq!(positive_or_default(Some("12"), 24u32), 12);
        assert_eq!(positive_or_default(Some(" 48 "), 24u32), 48);
        assert_eq!(positive_or_default(Some("0"), 24u32), 24);
        assert_eq!(positive_or_default(Some("-3"), 24u32), 24);
        assert_eq!(positive_or_default(Some("soon"), 30u32), 30);
        assert_eq!(positive_or_default(Some("1.5"), 30u32), 30);
    }

    #[test]
    fn test_config_requires_database_url_for_postgres() {
        assert!(load(&[]).is_err());
        let config = load(&[("DATABASE_URL", "postgres://test")]).unwrap();
        assert_eq!(
            config.data_source,
            DataSource::Postgres { database_url: "postgres://test".into() }
        );
    }

    #[test]
    fn test_config_memory_source_needs_no_database() {
        let config = load(&[("DATA_SOURCE", "memory")]).unwrap();
        assert_eq!(config.data_source, DataSource::Memory);
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.app_base_url, "http://localhost:3000");
    }

    #[test]
    fn test_config_rejects_unknown_source() {
        assert!(load(&[("DATA_SOURCE", "supabase")]).is_err());
    }

    #[test]
    fn test_config_reminder_defaults_and_overrides() {
        let config = load(&[("DATA_SOURCE", "memory")]).unwrap();
        assert_eq!(config.reminders, ReminderSettings::default());
        assert_eq!(config.trigger_timeout_ms, 35_000);

        let config = load(&[
            ("DATA_SOURCE", "memory"),
            ("REMINDER_REPEAT_HOURS", "6"),
            ("MILEAGE_STALE_DAYS", "-1"),
        ])
        .unwrap();
        assert_eq!(config.reminders.repeat_hours, 6);
        assert_eq!(config.reminders.mileage_stale_days, 30);
    }

    #[test]
    fn test_config_email_transport() {
        // No key never silently falls back to logging
        let config = load(&[("DATA_SOURCE", "memory")]).unwrap();
        assert_eq!(config.email_transport, EmailTransport::Unconfigured);

        let config = load(&[("DATA_SOURCE", "memory"), ("RESEND_API_KEY", "  ")]).unwrap();
        assert_eq!(config.email_transport, EmailTransport::Unconfigured);

        let config = load(&[("DATA_SOURCE", "memory"), ("EMAIL_TRANSPORT", "resend")]).unwrap();
        assert_eq!(config.email_transport, EmailTransport::Unconfigured);

        let config = load(&[("DATA_SOURCE", "memory"), ("EMAIL_TRANSPORT", "log")]).unwrap();
        assert_eq!(config.email_transport, EmailTransport::Log);

        let config = load(&[("DATA_SOURCE", "memory"), ("RESEND_API_KEY", "re_123")]).unwrap();
        assert_eq!(config.email_transport, EmailTransport::Resend { api_key: "re_123".into() });
    }

    #[test]
    fn test_config_blank_secret_is_absent() {
        let config = load(&[("DATA_SOURCE", "memory"), ("REMINDER_CRON_SECRET", "")]).unwrap();
        assert!(config.reminder_cron_secret.is_none());
    }
}
