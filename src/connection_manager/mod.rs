//! Connection management for durable push connections
//!
//! This module provides:
//! - Connection handles with liveness state
//! - The tenant -> user connection registry
//! - Lifecycle watching (transport close, idle timeout)
//! - Connection statistics

mod lifecycle;
mod registry;
mod stats;
mod types;

pub(crate) use lifecycle::{spawn_watcher, ConnectionOwner};
pub use registry::{ConnectionRegistry, DEFAULT_BUFFER_SIZE};
pub use stats::{ConnectionStats, TenantConnectionStats};
pub use types::{CloseReason, ConnectionHandle, ConnectionKey, ConnectionState};
