//! Type definitions

pub mod messages;
pub mod reminder;
pub mod schedule;
pub mod service_log;
pub mod stamp;
pub mod vehicle;

pub use messages::*;
pub use reminder::*;
pub use schedule::*;
pub use service_log::*;
pub use stamp::*;
pub use vehicle::*;
