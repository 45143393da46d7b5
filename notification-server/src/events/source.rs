//! Record sources feeding the events hub.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Upper bound on records returned by a single poll.
pub const MAX_BATCH_SIZE: usize = 64;

/// One record read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl InboundRecord {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: payload.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A partitioned log the hub can consume.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Wait for the next batch of records.
    ///
    /// Returns an empty batch once `token` is cancelled.
    async fn poll(&self, token: &CancellationToken) -> Result<Vec<InboundRecord>>;

    /// Lightweight liveness check against the broker.
    async fn ping(&self) -> Result<()>;

    /// Stop consuming. Calling it more than once is harmless.
    async fn close(&self) -> Result<()>;
}

/// Source backed by an in-process channel.
pub struct ChannelSource {
    topic: String,
    receiver: Mutex<mpsc::Receiver<InboundRecord>>,
}

impl ChannelSource {
    /// Create a source together with the sender that feeds it.
    pub fn new(topic: impl Into<String>, capacity: usize) -> (mpsc::Sender<InboundRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let source = Self {
            topic: topic.into(),
            receiver: Mutex::new(rx),
        };
        (tx, source)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl RecordSource for ChannelSource {
    async fn poll(&self, token: &CancellationToken) -> Result<Vec<InboundRecord>> {
        let mut receiver = self.receiver.lock().await;

        let first = tokio::select! {
            _ = token.cancelled() => return Ok(Vec::new()),
            record = receiver.recv() => record,
        };

        let Some(first) = first else {
            // All senders are gone; nothing more will arrive.
            drop(receiver);
            token.cancelled().await;
            return Ok(Vec::new());
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH_SIZE {
            match receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }
        Ok(batch)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.receiver.lock().await.close();
        Ok(())
    }
}
