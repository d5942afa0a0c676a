//! Entry point for the rest of the application.
//!
//! One `NotificationHub` is built at startup and handed to the web layer and
//! to notification producers. It owns the durable connection registry, the
//! broadcaster over it and the email status channels.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{EmailStatusConfig, PushConfig};
use crate::connection_manager::{
    CloseReason, ConnectionRegistry, ConnectionStats, TenantConnectionStats,
};
use crate::email_status::{EmailStatus, EphemeralStatusRegistry};
use crate::notification::{Broadcaster, BroadcasterStatsSnapshot, NotificationEvent};
use crate::push::PushStream;
use crate::tasks::HeartbeatSweeper;

pub struct NotificationHub {
    push_config: PushConfig,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    email_status: Arc<EphemeralStatusRegistry>,
}

impl NotificationHub {
    pub fn new(push_config: PushConfig, email_config: &EmailStatusConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::with_buffer_size(push_config.buffer_size));
        let broadcaster = Broadcaster::with_send_timeout(registry.clone(), push_config.send_timeout());
        let email_status = Arc::new(EphemeralStatusRegistry::with_timeouts(
            email_config.timeout(),
            push_config.send_timeout(),
        ));

        Self {
            push_config,
            registry,
            broadcaster,
            email_status,
        }
    }

    /// Register a durable stream for an authenticated user
    pub fn register(&self, tenant_id: &str, user_id: &str, timeout: Duration) -> PushStream {
        self.registry.register(tenant_id, user_id, timeout)
    }

    /// Register a durable stream with the configured idle timeout
    pub fn register_default(&self, tenant_id: &str, user_id: &str) -> PushStream {
        self.register(tenant_id, user_id, self.push_config.connection_timeout())
    }

    /// Open an unauthenticated email status stream for `key`
    pub fn create_email_status_channel(&self, key: &str) -> PushStream {
        self.email_status.create_channel(key)
    }

    pub async fn notify_user(&self, tenant_id: &str, user_id: &str, event: NotificationEvent) -> bool {
        self.broadcaster.send_to_user(tenant_id, user_id, event).await
    }

    pub async fn notify_tenant(&self, tenant_id: &str, event: NotificationEvent) -> usize {
        self.broadcaster.broadcast_to_tenant(tenant_id, event).await
    }

    pub async fn publish_email_status(&self, key: &str, status: EmailStatus, message: &str) {
        self.email_status.publish(key, status, message).await
    }

    pub fn remove(&self, tenant_id: &str, user_id: &str) {
        self.registry.remove(tenant_id, user_id)
    }

    pub fn connection_count(&self, tenant_id: &str) -> usize {
        self.registry.connection_count(tenant_id)
    }

    pub fn total_connection_count(&self) -> usize {
        self.registry.total_connection_count()
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.registry.stats()
    }

    pub fn tenant_stats(&self, tenant_id: &str) -> TenantConnectionStats {
        self.registry.tenant_stats(tenant_id)
    }

    pub fn broadcaster_stats(&self) -> BroadcasterStatsSnapshot {
        self.broadcaster.stats()
    }

    pub fn email_status_channel_count(&self) -> usize {
        self.email_status.channel_count()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Build the sweeper for this hub's registry; the caller spawns it
    pub fn heartbeat_sweeper(&self, shutdown: broadcast::Receiver<()>) -> HeartbeatSweeper {
        HeartbeatSweeper::new(&self.push_config, self.registry.clone(), shutdown)
    }

    /// Close every durable connection and email status channel
    pub fn shutdown(&self) {
        let connections = self.registry.close_all(CloseReason::Shutdown);
        let channels = self.email_status.close_all(CloseReason::Shutdown);
        tracing::info!(
            connections = connections,
            email_status_channels = channels,
            "Closed all push streams"
        );
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(PushConfig::default(), &EmailStatusConfig::default())
    }
}
