//! Domain layer.
//!
//! Notification entities and the query filter used by the read path.

pub mod filter;
pub mod notification;

pub use filter::LastTime;
pub use notification::{Notification, NotificationRecord};
