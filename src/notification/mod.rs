//! Notification events and their delivery to durable connections.
//!
//! - `types`: the notification event forwarded to clients and its builder
//! - `broadcaster`: per-user and per-tenant delivery over the connection registry

mod broadcaster;
mod types;

pub use broadcaster::{Broadcaster, BroadcasterStatsSnapshot, DEFAULT_SEND_TIMEOUT};
pub use types::{NotificationBuilder, NotificationEvent, NotificationMetadata, Priority};
