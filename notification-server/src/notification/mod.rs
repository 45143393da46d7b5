//! Notification service module.
//!
//! [`NotificationService`] is the single seam between ingestion, the read API
//! and storage.

pub mod service;

pub use service::NotificationService;
