//! Lifecycle services: component capabilities, health probing and the
//! container that owns them.

pub mod component;
pub mod container;
pub mod health;

pub use component::{Component, Runnable};
pub use container::{Container, ContainerTimeouts, ShutdownReport};
pub use health::{ComponentHealth, HealthState, HealthStatus, SystemHealth};
