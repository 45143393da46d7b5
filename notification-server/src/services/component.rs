//! Lifecycle capabilities shared by every long-lived component.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// A component whose lifetime is owned by the [`Container`](super::Container).
#[async_trait]
pub trait Component: Send + Sync {
    /// Diagnostic name, unique within a container.
    fn name(&self) -> &str;

    /// Whether [`Component::is_healthy`] says anything useful about this component.
    fn supports_health_check(&self) -> bool {
        true
    }

    /// Lightweight, side-effect-free reachability check.
    async fn is_healthy(&self) -> Result<()> {
        Ok(())
    }

    /// Release held resources. Must tolerate being called more than once.
    async fn close(&self) -> Result<()>;
}

/// A component that owns a blocking run loop.
#[async_trait]
pub trait Runnable: Component {
    /// Run until `token` is cancelled.
    ///
    /// Cancellation is a normal exit and returns `Ok(())`.
    async fn run(&self, token: CancellationToken) -> Result<()>;
}
