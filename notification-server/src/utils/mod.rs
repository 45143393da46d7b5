//! Small stateless helpers shared across the crate.

pub mod id;
pub mod time;
