//! Notification cache.
//!
//! The cache only ever speeds up reads. Every write goes to storage first, and
//! a missing or failing cache never changes what callers observe.

mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;

use crate::Result;
use crate::domain::Notification;
use crate::services::Component;

/// Cache capability.
#[async_trait]
pub trait Cache: Component {
    async fn get(&self, id: &str) -> Result<Option<Notification>>;

    async fn put(&self, notification: &Notification) -> Result<()>;

    async fn invalidate(&self, id: &str) -> Result<()>;
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl Component for NoopCache {
    fn name(&self) -> &str {
        "cache"
    }

    fn supports_health_check(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _id: &str) -> Result<Option<Notification>> {
        Ok(None)
    }

    async fn put(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationRecord;

    #[tokio::test]
    async fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        let record = NotificationRecord::new("svc", "msg", chrono::Utc::now());
        let notification = Notification::unread("n-1", &record);

        cache.put(&notification).await.unwrap();
        assert!(cache.get("n-1").await.unwrap().is_none());
        assert!(!cache.supports_health_check());
    }
}
