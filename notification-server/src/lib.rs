//! notification-server library crate.
//!
//! Consumes notification events from a Kafka / Redpanda topic, stores them
//! idempotently in SQLite and serves them over a small HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod error;
pub mod events;
pub mod logging;
pub mod notification;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
