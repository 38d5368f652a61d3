//! Database queries

pub mod schedule;
pub mod service_log;
pub mod vehicle;
