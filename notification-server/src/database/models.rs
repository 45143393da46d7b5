//! Database row models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::{Notification, NotificationRecord};
use crate::utils::time::{datetime_to_ms, ms_to_datetime};

/// Notification database model.
///
/// Timestamps are Unix epoch milliseconds (UTC).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationDbModel {
    pub id: String,
    pub service: String,
    pub message: String,
    pub is_read: bool,
    pub sent_at: i64,
    pub read_at: Option<i64>,
}

impl NotificationDbModel {
    /// Row for a freshly ingested record.
    pub fn from_record(record: &NotificationRecord, id: &str) -> Self {
        Self {
            id: id.to_string(),
            service: record.service.clone(),
            message: record.message.clone(),
            is_read: false,
            sent_at: datetime_to_ms(record.sent_at),
            read_at: None,
        }
    }
}

impl From<NotificationDbModel> for Notification {
    fn from(row: NotificationDbModel) -> Self {
        Self {
            id: row.id,
            service: row.service,
            message: row.message,
            is_read: row.is_read,
            sent_at: ms_to_datetime(row.sent_at),
            read_at: row.read_at.map(ms_to_datetime),
        }
    }
}

/// Notification dead letter database model.
/// Stores inbound records that could not be ingested.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationDeadLetterDbModel {
    pub id: String,
    pub topic: String,
    pub record_partition: i32,
    pub record_offset: i64,
    pub record_key: Option<String>,
    /// Raw payload, lossily decoded as UTF-8
    pub payload: String,
    pub error_message: String,
    pub correlation_id: String,
    pub created_at: i64,
}
