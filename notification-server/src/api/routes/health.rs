//! Health check route.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::server::AppState;
use crate::services::HealthStatus;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Latest health-loop results. 503 once any component has failed a probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.health.snapshot().await;
    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Unknown => StatusCode::OK,
    };
    (status, Json(health))
}
