//! HTTP server for the notification read API.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::routes;
use crate::notification::NotificationService;
use crate::services::{Component, HealthState, Runnable};
use crate::{Error, Result};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: NotificationService,
    pub health: HealthState,
}

/// Build the router with all middleware and routes.
pub fn build_router(state: AppState) -> Router {
    routes::create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves the read API until cancelled.
pub struct Controller {
    address: String,
    state: AppState,
}

impl Controller {
    pub fn new(address: impl Into<String>, service: NotificationService, health: HealthState) -> Self {
        Self {
            address: address.into(),
            state: AppState { service, health },
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

#[async_trait]
impl Component for Controller {
    fn name(&self) -> &str {
        "apiController"
    }

    fn supports_health_check(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Runnable for Controller {
    async fn run(&self, token: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self
            .address
            .parse()
            .map_err(|e| Error::config(format!("invalid API address '{}': {e}", self.address)))?;

        let listener = TcpListener::bind(addr).await?;
        info!(address = %addr, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                token.cancelled().await;
                info!("API server shutting down");
            })
            .await?;

        Ok(())
    }
}
