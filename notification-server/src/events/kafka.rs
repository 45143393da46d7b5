//! Kafka / Redpanda record source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rdkafka::ClientConfig;
use rdkafka::Message;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::BorrowedMessage;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{InboundRecord, MAX_BATCH_SIZE, RecordSource};
use crate::{Error, Result};

/// Timeout for the metadata request used as a liveness probe.
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Consumer group member reading one topic.
///
/// Offsets are committed by the client (`enable.auto.commit`) and a new group
/// starts from the earliest offset. `close` drops the client, which leaves the
/// group and shuts down its broker connections once no poll or probe holds it.
pub struct KafkaSource {
    consumer: Mutex<Option<Arc<StreamConsumer>>>,
    topic: String,
}

impl KafkaSource {
    pub fn connect(brokers: &[String], group_id: &str, topic: &str) -> Result<Self> {
        if brokers.is_empty() {
            return Err(Error::config("at least one broker is required"));
        }

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[topic])?;

        info!(brokers = %brokers.join(","), group = %group_id, topic = %topic, "Kafka consumer subscribed");

        Ok(Self {
            consumer: Mutex::new(Some(Arc::new(consumer))),
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn consumer(&self) -> Result<Arc<StreamConsumer>> {
        self.consumer
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::unhealthy("eventsHub", "Kafka consumer is closed"))
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> InboundRecord {
    InboundRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    }
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn poll(&self, token: &CancellationToken) -> Result<Vec<InboundRecord>> {
        let consumer = self.consumer().await?;
        let first = tokio::select! {
            _ = token.cancelled() => return Ok(Vec::new()),
            message = consumer.recv() => to_record(&message?),
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH_SIZE {
            match consumer.recv().now_or_never() {
                Some(Ok(message)) => batch.push(to_record(&message)),
                Some(Err(e)) => {
                    warn!(error = %e, "Error while draining batch");
                    break;
                }
                None => break,
            }
        }

        debug!(count = batch.len(), "Polled records");
        Ok(batch)
    }

    async fn ping(&self) -> Result<()> {
        let consumer = self.consumer().await?;
        let topic = self.topic.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let metadata = consumer.fetch_metadata(Some(&topic), METADATA_TIMEOUT)?;
            let entry = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .ok_or_else(|| Error::unhealthy("eventsHub", format!("topic {topic} not found")))?;

            if let Some(err) = entry.error() {
                return Err(Error::unhealthy(
                    "eventsHub",
                    format!("topic {topic} reports {err:?}"),
                ));
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("metadata probe task failed: {e}")))?
    }

    async fn close(&self) -> Result<()> {
        let Some(consumer) = self.consumer.lock().await.take() else {
            return Ok(());
        };
        consumer.unsubscribe();
        drop(consumer);
        info!(topic = %self.topic, "Kafka consumer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // librdkafka connects lazily, so an unreachable broker is enough here.
    fn unreachable_source() -> KafkaSource {
        KafkaSource::connect(&["127.0.0.1:1".to_string()], "test-group", "notifications").unwrap()
    }

    #[tokio::test]
    async fn test_close_releases_consumer() {
        let source = unreachable_source();
        source.close().await.unwrap();
        source.close().await.unwrap();

        assert!(source.consumer.lock().await.is_none());
        assert!(source.ping().await.is_err());
        let token = CancellationToken::new();
        assert!(source.poll(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_requires_brokers() {
        assert!(KafkaSource::connect(&[], "group", "notifications").is_err());
    }
}
