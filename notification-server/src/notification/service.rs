//! Notification service implementation.
//!
//! The NotificationService binds ingestion and the read API to storage:
//! - Assigning ids to inbound notifications
//! - Writing through to storage
//! - Priming and invalidating the cache

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, warn};

use crate::cache::Cache;
use crate::context::RequestContext;
use crate::database::Storage;
use crate::domain::{LastTime, Notification, NotificationRecord};
use crate::utils::id::new_notification_id;
use crate::Result;

/// The notification service.
///
/// Holds shared handles to storage and cache; it never closes them.
#[derive(Clone)]
pub struct NotificationService {
    storage: Arc<dyn Storage>,
    cache: Arc<dyn Cache>,
}

impl NotificationService {
    pub fn new(storage: Arc<dyn Storage>, cache: Arc<dyn Cache>) -> Self {
        Self { storage, cache }
    }

    /// Assign a new id to `record` and store it.
    ///
    /// The id is generated here; callers never provide one.
    pub async fn save_new_notification(
        &self,
        ctx: &RequestContext,
        record: &NotificationRecord,
    ) -> Result<Notification> {
        async {
            let id = new_notification_id();

            if let Err(e) = self.storage.store_new_notification(record, &id).await {
                error!(id = %id, error = %e, "Could not store new notification");
                return Err(e.context("could not store new notification"));
            }

            let notification = Notification::unread(id, record);
            self.prime_cache(&notification).await;

            info!(id = %notification.id, service = %notification.service, "Notification stored");
            Ok(notification)
        }
        .instrument(ctx.span().clone())
        .await
    }

    /// Load one notification, trying the cache first.
    pub async fn notification(&self, ctx: &RequestContext, id: &str) -> Result<Notification> {
        async {
            match self.cache.get(id).await {
                Ok(Some(notification)) => {
                    debug!(id = %id, "Cache hit");
                    return Ok(notification);
                }
                Ok(None) => {}
                Err(e) => warn!(id = %id, error = %e, "Cache lookup failed, reading storage"),
            }

            let notification = self.storage.get_notification(id).await?;
            self.prime_cache(&notification).await;
            Ok(notification)
        }
        .instrument(ctx.span().clone())
        .await
    }

    pub async fn notifications_by_time(
        &self,
        ctx: &RequestContext,
        service: &str,
        filter: LastTime,
    ) -> Result<Vec<Notification>> {
        self.storage
            .get_all_notifications_by_time(service, filter)
            .instrument(ctx.span().clone())
            .await
    }

    pub async fn latest_notifications(
        &self,
        ctx: &RequestContext,
        service: &str,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        self.storage
            .get_latest_notifications(service, limit)
            .instrument(ctx.span().clone())
            .await
    }

    pub async fn unread_notifications(
        &self,
        ctx: &RequestContext,
        service: &str,
    ) -> Result<Vec<Notification>> {
        self.storage
            .get_non_read_notifications(service)
            .instrument(ctx.span().clone())
            .await
    }

    /// Mark a notification as read and drop any cached copy.
    pub async fn mark_as_read(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        async {
            self.storage.mark_notification_as_read(id).await?;

            if let Err(e) = self.cache.invalidate(id).await {
                warn!(id = %id, error = %e, "Could not invalidate cached notification");
            }
            Ok(())
        }
        .instrument(ctx.span().clone())
        .await
    }

    async fn prime_cache(&self, notification: &Notification) {
        if let Err(e) = self.cache.put(notification).await {
            warn!(id = %notification.id, error = %e, "Could not cache notification");
        }
    }
}
