//! Component health probing.
//!
//! Probes run concurrently, each under its own timeout. The most recent
//! results are kept in a [`HealthState`] shared with the HTTP surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::Component;
use crate::utils::time::now_rfc3339;

/// Health status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Not probed yet.
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of probing one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub check_duration_ms: u64,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>, took: Duration) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
            check_duration_ms: took.as_millis() as u64,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>, took: Duration) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            check_duration_ms: took.as_millis() as u64,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

async fn probe_one(component: &dyn Component, timeout: Duration) -> ComponentHealth {
    let started = Instant::now();
    let name = component.name();

    match tokio::time::timeout(timeout, component.is_healthy()).await {
        Ok(Ok(())) => ComponentHealth::healthy(name, started.elapsed()),
        Ok(Err(e)) => ComponentHealth::unhealthy(name, e.to_string(), started.elapsed()),
        Err(_) => ComponentHealth::unhealthy(
            name,
            format!("health check timed out after {timeout:?}"),
            started.elapsed(),
        ),
    }
}

/// Probe every component that supports it, concurrently.
///
/// Results keep the order of `components`.
pub async fn probe_all(components: &[Arc<dyn Component>], timeout: Duration) -> Vec<ComponentHealth> {
    let probes = components
        .iter()
        .filter(|c| c.supports_health_check())
        .map(|c| probe_one(c.as_ref(), timeout));

    let results = join_all(probes).await;
    debug!(probed = results.len(), "Health probes finished");
    results
}

/// Aggregated health as served over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub uptime_secs: u64,
    pub last_check: Option<String>,
}

/// Latest probe results, shared between the health loop and readers.
#[derive(Clone)]
pub struct HealthState {
    started_at: Instant,
    inner: Arc<RwLock<Option<(Vec<ComponentHealth>, String)>>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            inner: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn update(&self, results: Vec<ComponentHealth>) {
        *self.inner.write().await = Some((results, now_rfc3339()));
    }

    pub async fn snapshot(&self) -> SystemHealth {
        let uptime_secs = self.started_at.elapsed().as_secs();
        match self.inner.read().await.as_ref() {
            Some((components, checked)) => SystemHealth {
                status: if components.iter().all(ComponentHealth::is_healthy) {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                },
                components: components.clone(),
                uptime_secs,
                last_check: Some(checked.clone()),
            },
            None => SystemHealth {
                status: HealthStatus::Unknown,
                components: Vec::new(),
                uptime_secs,
                last_check: None,
            },
        }
    }
}
