//! Human-facing labels for dashboard, timeline and email rendering.

use chrono::{Days, NaiveDate};

use crate::services::due_status::UpcomingService;

/// "Jul 1, 2024"
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Integer with thousands separators: 45210 -> "45,210".
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// "45,210 mi"
pub fn format_miles(miles: i64) -> String {
    format!("{} mi", format_thousands(miles))
}

/// Cents to dollars with two decimals: 8500 -> "$85.00".
pub fn format_cost_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// One-line summary such as "Due in 12 days • 480 miles remaining".
pub fn reminder_summary(service: &UpcomingService) -> Option<String> {
    if service.due_date_label.is_none() && service.miles_until_due.is_none() {
        return None;
    }

    let mut parts = Vec::new();

    if let Some(days) = service.days_until_due {
        parts.push(match days {
            d if d <= 0 => "Due now".to_string(),
            1 => "Due tomorrow".to_string(),
            d => format!("Due in {} days", d),
        });
    }

    if let Some(miles) = service.miles_until_due {
        parts.push(if miles <= 0 {
            "Mileage threshold met".to_string()
        } else {
            format!("{} miles remaining", format_thousands(miles))
        });
    }

    Some(parts.join(" • "))
}

/// Date the lead window opens, when the schedule has a due date and lead days.
pub fn reminder_preview_date(service: &UpcomingService) -> Option<String> {
    let lead_days = service.schedule.reminder_lead_days.filter(|d| *d > 0)?;
    let due = service.due_date?;
    due.checked_sub_days(Days::new(lead_days as u64))
        .map(format_display_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_date_has_no_padding() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(format_display_date(date), "Jul 1, 2024");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(45_210), "45,210");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
        assert_eq!(format_thousands(-1_500), "-1,500");
    }

    #[test]
    fn cost_label_two_decimals() {
        assert_eq!(format_cost_cents(8500), "$85.00");
        assert_eq!(format_cost_cents(4005), "$40.05");
        assert_eq!(format_cost_cents(7), "$0.07");
    }

    #[test]
    fn miles_label() {
        assert_eq!(format_miles(50_000), "50,000 mi");
    }
}
