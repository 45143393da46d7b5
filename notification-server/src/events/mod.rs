//! Event ingestion from the notification log.
//!
//! [`EventsHub`] reads batches from a [`RecordSource`], decodes each record and
//! stores it through the notification service. Records that fail go to a
//! [`FailurePolicy`]; the loop itself only stops on cancellation.

pub mod hub;
pub mod kafka;
pub mod policy;
pub mod source;

pub use hub::EventsHub;
pub use kafka::KafkaSource;
pub use policy::{DeadLetterPolicy, DropPolicy, FailurePolicy};
pub use source::{ChannelSource, InboundRecord, RecordSource};
