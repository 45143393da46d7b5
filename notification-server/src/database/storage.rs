//! Notification storage.
//!
//! Writes are upserts keyed by the notification id, so replaying a record
//! with the same id overwrites instead of duplicating.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::models::NotificationDbModel;
use super::{DbPool, init_pool, ping, run_migrations};
use crate::domain::{LastTime, Notification, NotificationRecord};
use crate::services::Component;
use crate::utils::time::{datetime_to_ms, now_utc};
use crate::{Error, Result};

/// Timeout for read queries.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the connectivity check done while connecting.
const CONNECT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification storage capability.
#[async_trait]
pub trait Storage: Component {
    /// Upsert an unread notification for `record` under `id`.
    async fn store_new_notification(&self, record: &NotificationRecord, id: &str) -> Result<()>;

    /// Flag a notification as read, stamping `read_at` with the current UTC time.
    async fn mark_notification_as_read(&self, id: &str) -> Result<()>;

    async fn get_notification(&self, id: &str) -> Result<Notification>;

    /// Notifications for `service` sent within the `filter` window, newest first.
    async fn get_all_notifications_by_time(
        &self,
        service: &str,
        filter: LastTime,
    ) -> Result<Vec<Notification>>;

    /// The `limit` most recent notifications for `service`.
    async fn get_latest_notifications(
        &self,
        service: &str,
        limit: u32,
    ) -> Result<Vec<Notification>>;

    /// Unread notifications for `service`, newest first.
    async fn get_non_read_notifications(&self, service: &str) -> Result<Vec<Notification>>;
}

/// SQLx implementation of [`Storage`].
#[derive(Clone)]
pub struct SqlxStorage {
    pool: DbPool,
    query_timeout: Duration,
}

impl SqlxStorage {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            query_timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Open the pool, verify connectivity and apply migrations.
    ///
    /// Any failure here means the service cannot start.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = init_pool(database_url)
            .await
            .map_err(|e| Error::from(e).context("invalid database configuration"))?;

        match tokio::time::timeout(CONNECT_PING_TIMEOUT, ping(&pool)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Database not connected, ping failed");
                return Err(Error::from(e).context("could not connect to database"));
            }
            Err(_) => {
                error!("Database not connected, ping timed out");
                return Err(Error::timeout("database ping", CONNECT_PING_TIMEOUT));
            }
        }

        run_migrations(&pool).await?;

        info!("Successfully connected to database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(operation, self.query_timeout)),
        }
    }
}

#[async_trait]
impl Component for SqlxStorage {
    fn name(&self) -> &str {
        "storage"
    }

    async fn is_healthy(&self) -> Result<()> {
        ping(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl Storage for SqlxStorage {
    async fn store_new_notification(&self, record: &NotificationRecord, id: &str) -> Result<()> {
        let row = NotificationDbModel::from_record(record, id);

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, service, message, is_read, sent_at, read_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                service = excluded.service,
                message = excluded.message,
                is_read = excluded.is_read,
                sent_at = excluded.sent_at,
                read_at = excluded.read_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.service)
        .bind(&row.message)
        .bind(row.is_read)
        .bind(row.sent_at)
        .bind(row.read_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(id = %row.id, service = %row.service, error = %e, "Could not upsert notification");
            return Err(Error::from(e).context(format!("failed to store notification {id}")));
        }

        debug!(id = %row.id, service = %row.service, "Stored notification");
        Ok(())
    }

    async fn mark_notification_as_read(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_argument("notification id cannot be empty"));
        }

        let read_at = datetime_to_ms(now_utc());

        let result = sqlx::query("UPDATE notifications SET is_read = 1, read_at = ? WHERE id = ?")
            .bind(read_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(id = %id, error = %e, "Could not update notification");
                Error::from(e).context(format!("failed to mark notification {id} as read"))
            })?;

        if result.rows_affected() == 0 {
            error!(id = %id, "No notification matched");
            return Err(Error::not_found("Notification", id));
        }

        info!(id = %id, "Notification marked as read");
        Ok(())
    }

    async fn get_notification(&self, id: &str) -> Result<Notification> {
        if id.is_empty() {
            return Err(Error::invalid_argument("notification id cannot be empty"));
        }

        let row = self
            .bounded("get notification", async {
                Ok::<_, Error>(sqlx::query_as::<_, NotificationDbModel>(
                    "SELECT * FROM notifications WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?)
            })
            .await
            .map_err(|e| e.context(format!("failed to load notification {id}")))?;

        row.map(Notification::from)
            .ok_or_else(|| Error::not_found("Notification", id))
    }

    async fn get_all_notifications_by_time(
        &self,
        service: &str,
        filter: LastTime,
    ) -> Result<Vec<Notification>> {
        let since = filter.since(now_utc());
        debug!(service = %service, since = %since, "Loading notifications by time");

        let rows = self
            .bounded("get notifications by time", async {
                Ok::<_, Error>(sqlx::query_as::<_, NotificationDbModel>(
                    r#"
                    SELECT * FROM notifications
                    WHERE service = ? AND sent_at >= ?
                    ORDER BY sent_at DESC, id DESC
                    "#,
                )
                .bind(service)
                .bind(datetime_to_ms(since))
                .fetch_all(&self.pool)
                .await?)
            })
            .await
            .map_err(|e| {
                error!(service = %service, error = %e, "Loading notifications by time failed");
                e.context(format!("failed to load notifications for {service}"))
            })?;

        debug!(service = %service, count = rows.len(), "Loaded notifications");
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn get_latest_notifications(
        &self,
        service: &str,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = self
            .bounded("get latest notifications", async {
                Ok::<_, Error>(sqlx::query_as::<_, NotificationDbModel>(
                    r#"
                    SELECT * FROM notifications
                    WHERE service = ?
                    ORDER BY sent_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(service)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?)
            })
            .await
            .map_err(|e| e.context(format!("failed to load latest notifications for {service}")))?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn get_non_read_notifications(&self, service: &str) -> Result<Vec<Notification>> {
        let rows = self
            .bounded("get unread notifications", async {
                Ok::<_, Error>(sqlx::query_as::<_, NotificationDbModel>(
                    r#"
                    SELECT * FROM notifications
                    WHERE service = ? AND is_read = 0
                    ORDER BY sent_at DESC, id DESC
                    "#,
                )
                .bind(service)
                .fetch_all(&self.pool)
                .await?)
            })
            .await
            .map_err(|e| e.context(format!("failed to load unread notifications for {service}")))?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }
}
