//! Stored timestamps and dates
//!
//! The repository keeps timestamps and calendar dates as the text the producer
//! wrote. They are parsed on read: a value that does not parse is treated as
//! absent by the evaluator and as "unparsable" by the reminder decisions.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// RFC 3339 timestamp as persisted (`2024-06-17T14:00:00.000Z`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct StoredTimestamp(String);

impl StoredTimestamp {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as an instant. Date-only values count as midnight UTC.
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

impl From<DateTime<Utc>> for StoredTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        Self(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Calendar date as persisted (`2024-07-01`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct StoredDate(String);

impl StoredDate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as a calendar date. A full timestamp contributes its UTC date.
    pub fn parse(&self) -> Option<NaiveDate> {
        let raw = self.0.trim();
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|ts| ts.with_timezone(&Utc).date_naive())
            })
    }
}

impl From<NaiveDate> for StoredDate {
    fn from(date: NaiveDate) -> Self {
        Self(date.format(DATE_FORMAT).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_parses_rfc3339_with_millis() {
        let ts = StoredTimestamp::new("2024-06-17T14:00:00.000Z");
        assert_eq!(ts.parse(), Some(Utc.with_ymd_and_hms(2024, 6, 17, 14, 0, 0).unwrap()));
    }

    #[test]
    fn timestamp_date_only_is_midnight_utc() {
        let ts = StoredTimestamp::new("2024-01-01");
        assert_eq!(ts.parse(), Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn garbage_timestamp_is_unparsable() {
        assert!(StoredTimestamp::new("last tuesday").parse().is_none());
        assert!(StoredTimestamp::new("").parse().is_none());
    }

    #[test]
    fn timestamp_written_from_datetime_reads_back() {
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 8, 30, 0).unwrap();
        let stored = StoredTimestamp::from(now);
        assert_eq!(stored.as_str(), "2024-02-15T08:30:00.000Z");
        assert_eq!(stored.parse(), Some(now));
    }

    #[test]
    fn date_accepts_timestamp_text() {
        let date = StoredDate::new("2024-08-15T10:00:00Z");
        assert_eq!(date.parse(), NaiveDate::from_ymd_opt(2024, 8, 15));
    }

    #[test]
    fn malformed_date_is_absent() {
        assert!(StoredDate::new("2024-13-45").parse().is_none());
    }
}
