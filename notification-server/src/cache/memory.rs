//! In-process TTL cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::Cache;
use crate::domain::Notification;
use crate::services::Component;
use crate::{Error, Result};

/// A cached notification with expiration time.
#[derive(Clone)]
struct CacheEntry {
    notification: Notification,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(notification: Notification, ttl: Duration) -> Self {
        Self {
            notification,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe notification cache with TTL-based eviction.
///
/// Writes sweep expired entries at most once per TTL, so the map only holds
/// what was written during roughly the last two TTLs.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    closed: Arc<AtomicBool>,
    created_at: Instant,
    /// Milliseconds since `created_at` of the last sweep.
    last_sweep_ms: Arc<AtomicU64>,
}

impl MemoryCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            closed: Arc::new(AtomicBool::new(false)),
            created_at: Instant::now(),
            last_sweep_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.len())
    }

    fn sweep_if_due(&self) {
        let now_ms = u64::try_from(self.created_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last) < ttl_ms {
            return;
        }
        // Only one writer sweeps per window.
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let removed = self.cleanup_expired();
        if removed > 0 {
            debug!(removed, remaining = self.len(), "Swept expired cache entries");
        }
    }
}

#[async_trait]
impl Component for MemoryCache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn is_healthy(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::unhealthy("cache", "cache has been closed"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, id: &str) -> Result<Option<Notification>> {
        let Some(entry) = self.entries.get(id) else {
            return Ok(None);
        };

        if entry.is_expired() {
            drop(entry); // Release the shard lock before removing
            self.entries.remove(id);
            return Ok(None);
        }

        Ok(Some(entry.notification.clone()))
    }

    async fn put(&self, notification: &Notification) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.sweep_if_due();
        self.entries.insert(
            notification.id.clone(),
            CacheEntry::new(notification.clone(), self.ttl),
        );
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> Result<()> {
        self.entries.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationRecord;

    fn notification(id: &str) -> Notification {
        let record = NotificationRecord::new("svc", "msg", chrono::Utc::now());
        Notification::unread(id, &record)
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = MemoryCache::with_ttl(Duration::from_secs(60));
        cache.put(&notification("a")).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap().unwrap().id, "a");
        cache.invalidate("a").await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let cache = MemoryCache::with_ttl(Duration::ZERO);
        cache.put(&notification("a")).await.unwrap();
        cache.put(&notification("b")).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.cleanup_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_writes_evict_expired_entries() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(1));
        for i in 0..10_000 {
            cache.put(&notification(&format!("old-{i}"))).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        for i in 0..100 {
            cache.put(&notification(&format!("new-{i}"))).await.unwrap();
        }

        assert!(cache.len() <= 100, "cache still holds {} entries", cache.len());
        assert!(cache.get("old-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fresh_entries_survive_sweeps() {
        let cache = MemoryCache::with_ttl(Duration::from_secs(60));
        for i in 0..50 {
            cache.put(&notification(&format!("n-{i}"))).await.unwrap();
        }

        assert_eq!(cache.len(), 50);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[tokio::test]
    async fn test_closed_cache_reports_unhealthy() {
        let cache = MemoryCache::with_ttl(Duration::from_secs(60));
        cache.put(&notification("a")).await.unwrap();
        assert!(cache.is_healthy().await.is_ok());

        cache.close().await.unwrap();
        cache.close().await.unwrap();

        assert!(cache.is_healthy().await.is_err());
        assert!(cache.is_empty());
    }
}
