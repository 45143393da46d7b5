//! What happens to a record that could not be ingested.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::source::InboundRecord;
use crate::context::RequestContext;
use crate::database::{DeadLetter, DeadLetterStore};
use crate::utils::id::new_notification_id;
use crate::utils::time::now_utc;
use crate::Error;

/// Handler for records whose processing failed.
///
/// Policies never fail; the hub moves on to the next record either way.
#[async_trait]
pub trait FailurePolicy: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, record: &InboundRecord, error: &Error);
}

/// Log the failure and drop the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropPolicy;

#[async_trait]
impl FailurePolicy for DropPolicy {
    async fn handle(&self, ctx: &RequestContext, record: &InboundRecord, error: &Error) {
        ctx.span().in_scope(|| {
            error!(
                payload_len = record.payload.len(),
                error = %error,
                "Dropping record that could not be processed"
            );
        });
    }
}

/// Persist the failed record as a dead letter.
pub struct DeadLetterPolicy {
    store: Arc<dyn DeadLetterStore>,
}

impl DeadLetterPolicy {
    pub fn new(store: Arc<dyn DeadLetterStore>) -> Self {
        Self { store }
    }
}

fn dead_letter_for(ctx: &RequestContext, record: &InboundRecord, error: &Error) -> DeadLetter {
    DeadLetter {
        id: new_notification_id(),
        topic: record.topic.clone(),
        partition: record.partition,
        offset: record.offset,
        key: record
            .key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned()),
        payload: String::from_utf8_lossy(&record.payload).into_owned(),
        error_message: error.to_string(),
        correlation_id: ctx.correlation_id().to_string(),
        created_at: now_utc(),
    }
}

#[async_trait]
impl FailurePolicy for DeadLetterPolicy {
    async fn handle(&self, ctx: &RequestContext, record: &InboundRecord, error: &Error) {
        let entry = dead_letter_for(ctx, record, error);

        if let Err(e) = self.store.add_dead_letter(&entry).await {
            ctx.span().in_scope(|| {
                error!(
                    error = %error,
                    dead_letter_error = %e,
                    "Could not persist dead letter, record dropped"
                );
            });
        }
    }
}
