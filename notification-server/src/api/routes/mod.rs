//! API route modules.

pub mod health;
pub mod notifications;

use axum::Router;

use crate::api::server::AppState;

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .with_state(state)
}
