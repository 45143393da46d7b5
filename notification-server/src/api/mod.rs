//! HTTP read surface over the notification service.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{AppState, Controller, build_router};
