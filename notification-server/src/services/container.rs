//! Process lifecycle orchestration.
//!
//! The container owns every long-lived component. It runs the runnable ones
//! and a health-check loop on their own tasks under a child cancellation
//! token, waits for the first failure or for the parent token, and then tears
//! everything down with bounded timeouts.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::health::{HealthState, probe_all};
use super::{Component, Runnable};
use crate::api::Controller;
use crate::cache::{Cache, MemoryCache, NoopCache};
use crate::config::{AppConfig, FailurePolicyKind};
use crate::database::SqlxStorage;
use crate::error::ResultExt;
use crate::events::{DeadLetterPolicy, DropPolicy, EventsHub, FailurePolicy, KafkaSource};
use crate::notification::NotificationService;
use crate::{Error, Result};

/// Timeouts governing the container lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct ContainerTimeouts {
    /// Pause between two rounds of health probes.
    pub health_check_interval: Duration,
    /// Budget for a single health probe.
    pub probe_timeout: Duration,
    /// Budget for a single close hook.
    pub close_timeout: Duration,
    /// How long running tasks get to return after cancellation.
    pub drain_timeout: Duration,
}

impl Default for ContainerTimeouts {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            close_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of running every close hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Components that closed cleanly, in close order.
    pub closed: Vec<String>,
    /// Components whose close hook failed or timed out.
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closed [{}]", self.closed.join(", "))?;
        if !self.failed.is_empty() {
            let failed: Vec<_> = self
                .failed
                .iter()
                .map(|(name, err)| format!("{name}: {err}"))
                .collect();
            write!(f, ", failed [{}]", failed.join("; "))?;
        }
        Ok(())
    }
}

/// Owner of every long-lived component.
pub struct Container {
    components: Vec<Arc<dyn Component>>,
    runnables: Vec<Arc<dyn Runnable>>,
    names: HashSet<String>,
    health: HealthState,
    timeouts: ContainerTimeouts,
}

impl Container {
    pub fn new(timeouts: ContainerTimeouts) -> Self {
        Self::with_health(timeouts, HealthState::new())
    }

    pub fn with_health(timeouts: ContainerTimeouts, health: HealthState) -> Self {
        Self {
            components: Vec::new(),
            runnables: Vec::new(),
            names: HashSet::new(),
            health,
            timeouts,
        }
    }

    /// Build every component from configuration, in dependency order.
    ///
    /// Components built before a failure are closed before the error is
    /// returned.
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let health = HealthState::new();
        let timeouts = ContainerTimeouts {
            health_check_interval: config.health_check_interval,
            ..ContainerTimeouts::default()
        };
        let mut container = Self::with_health(timeouts, health.clone());

        match container.build_components(config, health).await {
            Ok(()) => Ok(container),
            Err(e) => {
                let report = container.close().await;
                if !report.is_clean() {
                    warn!(report = %report, "Partial startup teardown had failures");
                }
                Err(e)
            }
        }
    }

    async fn build_components(&mut self, config: &AppConfig, health: HealthState) -> Result<()> {
        let storage = Arc::new(
            SqlxStorage::connect(&config.database_url)
                .await
                .context("could not initialize storage")?,
        );

        let (cache, cache_component): (Arc<dyn Cache>, Arc<dyn Component>) = if config.use_cache {
            let cache = Arc::new(MemoryCache::with_ttl(config.cache_ttl));
            (cache.clone(), cache)
        } else {
            let cache = Arc::new(NoopCache);
            (cache.clone(), cache)
        };

        let service = NotificationService::new(storage.clone(), cache);

        let policy: Arc<dyn FailurePolicy> = match config.failure_policy {
            FailurePolicyKind::Drop => Arc::new(DropPolicy),
            FailurePolicyKind::DeadLetter => Arc::new(DeadLetterPolicy::new(storage.clone())),
        };

        // The consumer is closed first and the storage last.
        let source = match KafkaSource::connect(&config.brokers, &config.consumer_group, &config.topic)
        {
            Ok(source) => source,
            Err(e) => {
                if let Err(close_err) = storage.close().await {
                    warn!(error = %close_err, "Could not close storage after failed startup");
                }
                return Err(e.context("could not initialize events hub"));
            }
        };
        let hub = Arc::new(EventsHub::new(Arc::new(source), service.clone(), policy));
        self.add_runnable(hub)?;

        let controller = Arc::new(Controller::new(config.api_address(), service, health));
        self.add_runnable(controller)?;

        self.register(cache_component)?;
        self.register(storage)?;

        info!(components = self.components.len(), "Container built");
        Ok(())
    }

    /// Register a component for health checks and close.
    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<()> {
        let name = component.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(Error::invalid_argument(format!(
                "component {name} is already registered"
            )));
        }
        self.components.push(component);
        Ok(())
    }

    /// Register a component that also owns a run loop.
    pub fn add_runnable<R: Runnable + 'static>(&mut self, runnable: Arc<R>) -> Result<()> {
        self.register(runnable.clone())?;
        self.runnables.push(runnable);
        Ok(())
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Run until `token` is cancelled or a task fails, then close everything.
    ///
    /// Returns the shutdown report on cancellation and the task error on
    /// failure.
    pub async fn run(&self, token: CancellationToken) -> Result<ShutdownReport> {
        let child = token.child_token();
        let producers = self.runnables.len() + 1;
        let (tx, mut rx) = mpsc::channel::<(String, Error)>(producers);
        let mut tasks = JoinSet::new();

        for runnable in &self.runnables {
            let runnable = Arc::clone(runnable);
            let token = child.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let name = runnable.name().to_string();
                info!(component = %name, "Starting");
                if let Err(e) = runnable.run(token).await {
                    let _ = tx.send((name, e)).await;
                }
            });
        }

        {
            let components = self.components.clone();
            let health = self.health.clone();
            let timeouts = self.timeouts;
            let token = child.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                if let Err(e) = health_loop(components, health, timeouts, token).await {
                    let _ = tx.send(("healthCheck".to_string(), e)).await;
                }
            });
        }
        drop(tx);

        let failure = tokio::select! {
            _ = token.cancelled() => {
                info!("Shutdown requested");
                None
            }
            received = rx.recv() => received,
        };

        if let Some((name, e)) = &failure {
            error!(component = %name, error = %e, "Task failed, shutting down");
        }

        child.cancel();
        self.drain(&mut tasks).await;

        let report = self.close().await;
        match failure {
            Some((name, e)) => Err(e.context(format!("{name} failed"))),
            None => Ok(report),
        }
    }

    async fn drain(&self, tasks: &mut JoinSet<()>) {
        let drained = tokio::time::timeout(self.timeouts.drain_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                timeout = ?self.timeouts.drain_timeout,
                "Tasks did not stop in time, aborting"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }

    /// Run every close hook in registration order, each under its own timeout.
    ///
    /// A failing hook never prevents the remaining ones from running.
    pub async fn close(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        for component in &self.components {
            let name = component.name().to_string();
            match tokio::time::timeout(self.timeouts.close_timeout, component.close()).await {
                Ok(Ok(())) => {
                    info!(component = %name, "Closed");
                    report.closed.push(name);
                }
                Ok(Err(e)) => {
                    error!(component = %name, error = %e, "Close failed");
                    report.failed.push((name, e.to_string()));
                }
                Err(_) => {
                    let e = Error::timeout(format!("closing {name}"), self.timeouts.close_timeout);
                    error!(component = %name, error = %e, "Close timed out");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        if report.is_clean() {
            info!(report = %report, "Shutdown complete");
        } else {
            warn!(report = %report, "Shutdown completed with errors");
        }
        report
    }
}

async fn health_loop(
    components: Vec<Arc<dyn Component>>,
    health: HealthState,
    timeouts: ContainerTimeouts,
    token: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(timeouts.health_check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        let results = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            results = probe_all(&components, timeouts.probe_timeout) => results,
        };

        let failure = results.iter().find(|r| !r.is_healthy()).map(|r| {
            Error::unhealthy(&r.name, r.message.clone().unwrap_or_default())
        });
        health.update(results).await;

        if let Some(e) = failure {
            return Err(e);
        }
    }
}
