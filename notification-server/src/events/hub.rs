//! The ingestion loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::policy::FailurePolicy;
use super::source::{InboundRecord, RecordSource};
use crate::context::RequestContext;
use crate::domain::{Notification, NotificationRecord};
use crate::notification::NotificationService;
use crate::services::{Component, Runnable};
use crate::Result;

/// Pause after a failed poll before trying again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Consumes notification records and hands them to the service.
pub struct EventsHub {
    source: Arc<dyn RecordSource>,
    service: NotificationService,
    policy: Arc<dyn FailurePolicy>,
    poll_error_pause: Duration,
}

impl EventsHub {
    pub fn new(
        source: Arc<dyn RecordSource>,
        service: NotificationService,
        policy: Arc<dyn FailurePolicy>,
    ) -> Self {
        Self {
            source,
            service,
            policy,
            poll_error_pause: POLL_ERROR_PAUSE,
        }
    }

    pub fn with_poll_error_pause(mut self, pause: Duration) -> Self {
        self.poll_error_pause = pause;
        self
    }

    /// Process one record. Failures go to the failure policy.
    pub async fn handle_record(&self, record: &InboundRecord) {
        let ctx = RequestContext::for_record(&record.topic, record.partition, record.offset);

        match self.ingest(&ctx, record).await {
            Ok(notification) => {
                ctx.span().in_scope(|| {
                    debug!(id = %notification.id, "Record ingested");
                });
            }
            Err(e) => self.policy.handle(&ctx, record, &e).await,
        }
    }

    async fn ingest(&self, ctx: &RequestContext, record: &InboundRecord) -> Result<Notification> {
        let decoded = NotificationRecord::decode(&record.payload)?;
        self.service.save_new_notification(ctx, &decoded).await
    }
}

#[async_trait]
impl Component for EventsHub {
    fn name(&self) -> &str {
        "eventsHub"
    }

    async fn is_healthy(&self) -> Result<()> {
        self.source.ping().await
    }

    async fn close(&self) -> Result<()> {
        self.source.close().await
    }
}

#[async_trait]
impl Runnable for EventsHub {
    async fn run(&self, token: CancellationToken) -> Result<()> {
        info!("Events hub started");

        while !token.is_cancelled() {
            match self.source.poll(&token).await {
                Ok(batch) => {
                    for record in &batch {
                        self.handle_record(record).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Poll failed");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_error_pause) => {}
                    }
                }
            }
        }

        info!("Events hub stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::Error;
    use crate::cache::NoopCache;
    use crate::events::source::ChannelSource;
    use crate::testing::MemoryStorage;

    #[derive(Default)]
    struct CountingPolicy {
        failures: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl FailurePolicy for CountingPolicy {
        async fn handle(&self, _ctx: &RequestContext, record: &InboundRecord, _error: &Error) {
            self.failures.lock().unwrap().push(record.offset);
        }
    }

    fn payload(service: &str) -> Vec<u8> {
        format!(r#"{{"service":"{service}","message":"hello","sentAt":"2026-03-01T10:00:00+02:00"}}"#)
            .into_bytes()
    }

    #[tokio::test]
    async fn test_bad_record_does_not_stop_later_records() {
        let storage = Arc::new(MemoryStorage::default());
        let service = NotificationService::new(storage.clone(), Arc::new(NoopCache));
        let policy = Arc::new(CountingPolicy::default());
        let (tx, source) = ChannelSource::new("notifications", 8);
        let hub = Arc::new(EventsHub::new(Arc::new(source), service, policy.clone()));

        tx.send(InboundRecord::new("notifications", 0, 0, payload("billing"))).await.unwrap();
        tx.send(InboundRecord::new("notifications", 0, 1, "{not json")).await.unwrap();
        tx.send(InboundRecord::new("notifications", 0, 2, Vec::new())).await.unwrap();
        tx.send(InboundRecord::new("notifications", 0, 3, payload("shipping"))).await.unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let hub = hub.clone();
            let token = token.clone();
            async move { hub.run(token).await }
        });

        tokio::time::timeout(Duration::from_secs(2), async {
            while storage.len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(*policy.failures.lock().unwrap(), vec![1, 2]);
        let mut services: Vec<_> = storage.all().into_iter().map(|n| n.service).collect();
        services.sort();
        assert_eq!(services, vec!["billing", "shipping"]);
    }

    #[tokio::test]
    async fn test_storage_failure_goes_to_policy() {
        let storage = Arc::new(MemoryStorage::failing());
        let service = NotificationService::new(storage, Arc::new(NoopCache));
        let policy = Arc::new(CountingPolicy::default());
        let (_tx, source) = ChannelSource::new("notifications", 1);
        let hub = EventsHub::new(Arc::new(source), service, policy.clone());

        hub.handle_record(&InboundRecord::new("notifications", 3, 7, payload("billing")))
            .await;

        assert_eq!(*policy.failures.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_run_returns_ok_on_cancel() {
        let service = NotificationService::new(Arc::new(MemoryStorage::default()), Arc::new(NoopCache));
        let (_tx, source) = ChannelSource::new("notifications", 1);
        let hub = EventsHub::new(Arc::new(source), service, Arc::new(CountingPolicy::default()));

        let token = CancellationToken::new();
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), hub.run(token)).await;
        assert!(result.unwrap().is_ok());
        hub.close().await.unwrap();
        hub.close().await.unwrap();
    }
}
