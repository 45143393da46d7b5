//! Dead letter persistence for records that could not be ingested.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SqlxStorage;
use super::models::NotificationDeadLetterDbModel;
use crate::utils::time::{datetime_to_ms, ms_to_datetime};
use crate::{Error, Result};

/// A record that failed ingestion, kept for inspection or replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: String,
    pub error_message: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDeadLetterDbModel> for DeadLetter {
    fn from(row: NotificationDeadLetterDbModel) -> Self {
        Self {
            id: row.id,
            topic: row.topic,
            partition: row.record_partition,
            offset: row.record_offset,
            key: row.record_key,
            payload: row.payload,
            error_message: row.error_message,
            correlation_id: row.correlation_id,
            created_at: ms_to_datetime(row.created_at),
        }
    }
}

impl From<&DeadLetter> for NotificationDeadLetterDbModel {
    fn from(entry: &DeadLetter) -> Self {
        Self {
            id: entry.id.clone(),
            topic: entry.topic.clone(),
            record_partition: entry.partition,
            record_offset: entry.offset,
            record_key: entry.key.clone(),
            payload: entry.payload.clone(),
            error_message: entry.error_message.clone(),
            correlation_id: entry.correlation_id.clone(),
            created_at: datetime_to_ms(entry.created_at),
        }
    }
}

/// Destination for dead letters.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn add_dead_letter(&self, entry: &DeadLetter) -> Result<()>;

    /// Most recent dead letters first.
    async fn list_dead_letters(&self, limit: u32) -> Result<Vec<DeadLetter>>;
}

#[async_trait]
impl DeadLetterStore for SqlxStorage {
    async fn add_dead_letter(&self, entry: &DeadLetter) -> Result<()> {
        let row = NotificationDeadLetterDbModel::from(entry);

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO notification_dead_letter (
                id, topic, record_partition, record_offset, record_key,
                payload, error_message, correlation_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.topic)
        .bind(row.record_partition)
        .bind(row.record_offset)
        .bind(&row.record_key)
        .bind(&row.payload)
        .bind(&row.error_message)
        .bind(&row.correlation_id)
        .bind(row.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::from(e).context(format!(
                "failed to dead-letter record {}/{}@{}",
                row.topic, row.record_partition, row.record_offset
            ))
        })?;
        Ok(())
    }

    async fn list_dead_letters(&self, limit: u32) -> Result<Vec<DeadLetter>> {
        let rows = sqlx::query_as::<_, NotificationDeadLetterDbModel>(
            "SELECT * FROM notification_dead_letter ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(DeadLetter::from).collect())
    }
}
