//! Identifier generation.

use uuid::Uuid;

/// New notification id.
///
/// UUID v7 ids sort by creation time, so ids assigned by one process are
/// monotonic in practice.
pub fn new_notification_id() -> String {
    Uuid::now_v7().to_string()
}

/// New per-record correlation id used only for tracing.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
