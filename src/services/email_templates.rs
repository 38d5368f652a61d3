//! Reminder email templates.
//!
//! Supported templates:
//!   - `ScheduleReminderEmail` - a schedule entered its lead window or is overdue
//!   - `MileageReminderEmail`  - the recorded odometer reading has gone stale
//!
//! `render()` returns an `EmailMessage` ready to pass to `EmailSender::send`.

use crate::services::due_status::UpcomingService;
use crate::services::email_sender::EmailMessage;
use crate::services::labels::{format_thousands, reminder_summary};
use crate::types::Vehicle;

const BUTTON_STYLE: &str = "display:inline-block; background:#0a84ff; color:#fff; padding:12px 20px; border-radius:999px; text-decoration:none; font-weight:600;";
const FOOTER_STYLE: &str = "margin:24px 0 0; font-size:13px; color:#6b7280;";

fn vehicle_label(vehicle: &Vehicle) -> String {
    let label = vehicle.label();
    if label.is_empty() {
        "your vehicle".to_string()
    } else {
        label
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn join_text(lines: Vec<String>) -> String {
    lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Schedule reminder
// =============================================================================

pub struct ScheduleReminderEmail<'a> {
    pub to: &'a str,
    pub vehicle: &'a Vehicle,
    pub service: &'a UpcomingService,
    /// Link to the service log form
    pub action_url: Option<&'a str>,
}

impl<'a> ScheduleReminderEmail<'a> {
    /// "Target date: Jul 1, 2024", "480 miles remaining"
    fn details(&self) -> Vec<String> {
        let mut details = Vec::new();
        if let Some(label) = &self.service.due_date_label {
            details.push(format!("Target date: {}", label));
        }
        if let Some(miles) = self.service.miles_until_due {
            details.push(if miles <= 0 {
                "Mileage threshold reached".to_string()
            } else {
                format!("{} miles remaining", format_thousands(miles))
            });
        }
        details
    }

    pub fn render(&self) -> EmailMessage {
        let service_name = &self.service.schedule.service_name;
        let vehicle = vehicle_label(self.vehicle);
        let summary = reminder_summary(self.service)
            .unwrap_or_else(|| "Stay on track with your maintenance schedule.".to_string());
        let details = self.details();

        let mut text = vec![
            "Hi there!".to_string(),
            format!("{} is coming up for {}.", service_name, vehicle),
            summary.clone(),
            details.join(" | "),
        ];
        if let Some(url) = self.action_url {
            text.push(format!("Log the service now: {}", url));
        }
        text.push("Keep your maintenance on track with AutoTrack.".to_string());

        let mut html = vec![
            format!(
                r#"<p style="margin:0 0 16px; font-size:16px;">{} is coming up for <strong>{}</strong>.</p>"#,
                escape_html(service_name),
                escape_html(&vehicle)
            ),
            format!(r#"<p style="margin:0 0 12px; font-size:15px;">{}</p>"#, escape_html(&summary)),
        ];
        if !details.is_empty() {
            let items: String = details
                .iter()
                .map(|d| format!("<li>{}</li>", escape_html(d)))
                .collect();
            html.push(format!(
                r#"<ul style="margin:0 0 16px; padding-left:20px; font-size:14px;">{}</ul>"#,
                items
            ));
        }
        if let Some(url) = self.action_url {
            html.push(format!(
                r#"<p style="margin:0 0 16px;"><a href="{}" style="{}">Log this service</a></p>"#,
                escape_html(url),
                BUTTON_STYLE
            ));
        }
        html.push(format!(
            r#"<p style="{}">You are receiving this reminder because you asked AutoTrack to keep you up to date on maintenance.</p>"#,
            FOOTER_STYLE
        ));

        EmailMessage {
            to: self.to.to_string(),
            subject: format!("AutoTrack reminder: {}", service_name),
            html: html.concat(),
            text: join_text(text),
        }
    }
}

// =============================================================================
// Mileage reminder
// =============================================================================

pub struct MileageReminderEmail<'a> {
    pub to: &'a str,
    pub vehicle: &'a Vehicle,
    /// Link to the mileage update form
    pub action_url: Option<&'a str>,
}

impl<'a> MileageReminderEmail<'a> {
    pub fn render(&self) -> EmailMessage {
        let vehicle = vehicle_label(self.vehicle);

        let mut text = vec![
            "Hi there!".to_string(),
            format!("It has been a while since you updated the mileage for {}.", vehicle),
            "Keeping your odometer reading current helps AutoTrack send accurate maintenance reminders.".to_string(),
        ];
        if let Some(url) = self.action_url {
            text.push(format!("Update your mileage now: {}", url));
        }
        text.push("Safe driving! The AutoTrack team".to_string());

        let mut html = vec![
            format!(
                r#"<p style="margin:0 0 16px; font-size:16px;">It has been a while since you updated the mileage for <strong>{}</strong>.</p>"#,
                escape_html(&vehicle)
            ),
            r#"<p style="margin:0 0 16px; font-size:15px;">Keeping your odometer reading current helps AutoTrack keep your maintenance reminders accurate.</p>"#.to_string(),
        ];
        if let Some(url) = self.action_url {
            html.push(format!(
                r#"<p style="margin:0 0 16px;"><a href="{}" style="{}">Update mileage</a></p>"#,
                escape_html(url),
                BUTTON_STYLE
            ));
        }
        html.push(format!(
            r#"<p style="{}">You are receiving this reminder because you asked AutoTrack to send mileage updates.</p>"#,
            FOOTER_STYLE
        ));

        EmailMessage {
            to: self.to.to_string(),
            subject: "AutoTrack reminder: Update your mileage".to_string(),
            html: html.concat(),
            text: join_text(text),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
