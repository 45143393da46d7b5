//! HTTP API tests driven through the router without a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use notification_server::api::{AppState, build_router};
use notification_server::cache::MemoryCache;
use notification_server::database::{SqlxStorage, Storage, init_pool, run_migrations};
use notification_server::domain::{Notification, NotificationRecord};
use notification_server::notification::NotificationService;
use notification_server::services::HealthState;
use serde_json::Value;
use tower::ServiceExt;

async fn setup() -> (axum::Router, Arc<SqlxStorage>) {
    let pool = init_pool("sqlite::memory:")
        .await
        .expect("Failed to create test pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    let storage = Arc::new(SqlxStorage::new(pool));
    let service = NotificationService::new(
        storage.clone(),
        Arc::new(MemoryCache::with_ttl(Duration::from_secs(60))),
    );
    let router = build_router(AppState {
        service,
        health: HealthState::new(),
    });
    (router, storage)
}

async fn send(router: &axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_is_ok_before_first_probe() {
    let (router, _storage) = setup().await;

    let (status, body) = send(&router, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unknown");
}

#[tokio::test]
async fn test_read_routes() {
    let (router, storage) = setup().await;
    let now = Utc::now();
    for (id, minutes) in [("a", 5), ("b", 50), ("c", 500)] {
        let record = NotificationRecord::new("billing", id, now - chrono::Duration::minutes(minutes));
        storage.store_new_notification(&record, id).await.unwrap();
    }

    let (status, body) = send(&router, Method::GET, "/notifications/billing?hours=1").await;
    assert_eq!(status, StatusCode::OK);
    let by_time: Vec<Notification> = serde_json::from_value(body).unwrap();
    assert_eq!(by_time.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

    let (_, body) = send(&router, Method::GET, "/notifications/billing/latest?limit=1").await;
    let latest: Vec<Notification> = serde_json::from_value(body).unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, "a");

    let (status, body) = send(&router, Method::GET, "/notification/c").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRead"], false);
    assert!(body["sentAt"].is_string());
}

#[tokio::test]
async fn test_mark_read_flow() {
    let (router, storage) = setup().await;
    let record = NotificationRecord::new("billing", "invoice", Utc::now());
    storage.store_new_notification(&record, "n-1").await.unwrap();

    // Prime the cache so the read after the update proves invalidation.
    let (_, body) = send(&router, Method::GET, "/notification/n-1").await;
    assert_eq!(body["isRead"], false);

    let (status, _) = send(&router, Method::POST, "/notification/n-1/read").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&router, Method::GET, "/notification/n-1").await;
    assert_eq!(body["isRead"], true);
    assert!(body["readAt"].is_string());

    let (_, body) = send(&router, Method::GET, "/notifications/billing/unread").await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_error_statuses() {
    let (router, _storage) = setup().await;

    let (status, body) = send(&router, Method::POST, "/notification/missing/read").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(&router, Method::GET, "/notification/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, Method::GET, "/notifications/billing?days=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
