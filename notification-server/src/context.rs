//! Per-record and per-request processing context.
//!
//! Each inbound record (or HTTP request) gets its own correlation id and a
//! tracing span carrying it. Handlers receive the context by reference and
//! log inside its span, so no logger state is shared between records.

use tracing::{Span, info_span};

use crate::utils::id::new_correlation_id;

/// Context for handling one unit of work.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: String,
    span: Span,
}

impl RequestContext {
    /// Context for a record read from the log.
    pub fn for_record(topic: &str, partition: i32, offset: i64) -> Self {
        let correlation_id = new_correlation_id();
        let span = info_span!(
            "record",
            correlation_id = %correlation_id,
            topic = %topic,
            partition,
            offset
        );
        Self {
            correlation_id,
            span,
        }
    }

    /// Context for an API request.
    pub fn for_request(method: &str, path: &str) -> Self {
        let correlation_id = new_correlation_id();
        let span = info_span!(
            "request",
            correlation_id = %correlation_id,
            method = %method,
            path = %path
        );
        Self {
            correlation_id,
            span,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
