//! Business logic services

pub mod due_status;
pub mod email_sender;
pub mod email_templates;
pub mod labels;
pub mod next_service;
pub mod recurrence;
pub mod reminder_decision;
pub mod reminder_dispatch;
pub mod reminder_locks;
pub mod reminder_mailer;
pub mod timeline;
