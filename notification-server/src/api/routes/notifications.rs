//! Notification read routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::context::RequestContext;
use crate::domain::{LastTime, Notification};

/// Page size when `limit` is not given.
pub const DEFAULT_LATEST_LIMIT: u32 = 20;

/// Upper bound on `limit`.
pub const MAX_LATEST_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications/{service}", get(by_time))
        .route("/notifications/{service}/latest", get(latest))
        .route("/notifications/{service}/unread", get(unread))
        .route("/notification/{id}", get(get_one))
        .route("/notification/{id}/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub limit: Option<u32>,
}

impl LatestQuery {
    fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LATEST_LIMIT)
            .min(MAX_LATEST_LIMIT)
    }
}

async fn by_time(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(filter): Query<LastTime>,
) -> ApiResult<Json<Vec<Notification>>> {
    let ctx = RequestContext::for_request("GET", "/notifications/{service}");
    let notifications = state
        .service
        .notifications_by_time(&ctx, &service, filter)
        .await?;
    Ok(Json(notifications))
}

async fn latest(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let ctx = RequestContext::for_request("GET", "/notifications/{service}/latest");
    let notifications = state
        .service
        .latest_notifications(&ctx, &service, query.limit())
        .await?;
    Ok(Json(notifications))
}

async fn unread(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> ApiResult<Json<Vec<Notification>>> {
    let ctx = RequestContext::for_request("GET", "/notifications/{service}/unread");
    let notifications = state.service.unread_notifications(&ctx, &service).await?;
    Ok(Json(notifications))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let ctx = RequestContext::for_request("GET", "/notification/{id}");
    let notification = state.service.notification(&ctx, &id).await?;
    Ok(Json(notification))
}

async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let ctx = RequestContext::for_request("POST", "/notification/{id}/read");
    state.service.mark_as_read(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
