//! In-memory doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::database::Storage;
use crate::domain::{LastTime, Notification, NotificationRecord};
use crate::services::{Component, Runnable};
use crate::utils::time::now_utc;
use crate::{Error, Result};

/// HashMap-backed storage.
#[derive(Default)]
pub struct MemoryStorage {
    rows: Mutex<HashMap<String, Notification>>,
    fail_writes: AtomicBool,
    pub closes: AtomicUsize,
}

impl MemoryStorage {
    pub fn failing() -> Self {
        let storage = Self::default();
        storage.fail_writes.store(true, Ordering::SeqCst);
        storage
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    fn for_service(&self, service: &str, keep: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|n| n.service == service && keep(n))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
        rows
    }
}

#[async_trait]
impl Component for MemoryStorage {
    fn name(&self) -> &str {
        "storage"
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store_new_notification(&self, record: &NotificationRecord, id: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Other("storage unavailable".into()));
        }
        self.rows
            .lock()
            .unwrap()
            .insert(id.to_string(), Notification::unread(id, record));
        Ok(())
    }

    async fn mark_notification_as_read(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_argument("notification id must not be empty"));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(id)
            .ok_or_else(|| Error::not_found("notification", id))?;
        row.mark_read(now_utc());
        Ok(())
    }

    async fn get_notification(&self, id: &str) -> Result<Notification> {
        self.rows
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("notification", id))
    }

    async fn get_all_notifications_by_time(
        &self,
        service: &str,
        filter: LastTime,
    ) -> Result<Vec<Notification>> {
        let since = filter.since(now_utc());
        Ok(self.for_service(service, |n| n.sent_at >= since))
    }

    async fn get_latest_notifications(
        &self,
        service: &str,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        let mut rows = self.for_service(service, |_| true);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn get_non_read_notifications(&self, service: &str) -> Result<Vec<Notification>> {
        Ok(self.for_service(service, |n| !n.is_read))
    }
}

/// Component with scripted probe and close behaviour.
pub struct ScriptedComponent {
    name: String,
    healthy: AtomicBool,
    fail_close: bool,
    close_delay: Duration,
    pub closes: AtomicUsize,
    pub probes: AtomicUsize,
}

impl ScriptedComponent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            healthy: AtomicBool::new(true),
            fail_close: false,
            close_delay: Duration::ZERO,
            closes: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn slow_close(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for ScriptedComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_healthy(&self) -> Result<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::unhealthy(&self.name, "scripted failure"))
        }
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        if self.fail_close {
            return Err(Error::Other(format!("{} refused to close", self.name)));
        }
        Ok(())
    }
}

/// Runnable that idles until cancelled, or fails after a delay.
pub struct ScriptedRunnable {
    name: String,
    fail_after: Option<Duration>,
    saw_cancel: AtomicBool,
    pub closes: AtomicUsize,
}

impl ScriptedRunnable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_after: None,
            saw_cancel: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn fail_after(mut self, delay: Duration) -> Self {
        self.fail_after = Some(delay);
        self
    }

    pub fn saw_cancel(&self) -> bool {
        self.saw_cancel.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Component for ScriptedRunnable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Runnable for ScriptedRunnable {
    async fn run(&self, token: CancellationToken) -> Result<()> {
        if let Some(delay) = self.fail_after {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    return Err(Error::Other(format!("{} crashed", self.name)));
                }
            }
        } else {
            token.cancelled().await;
        }
        self.saw_cancel.store(true, Ordering::SeqCst);
        Ok(())
    }
}
