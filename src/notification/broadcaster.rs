use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::connection_manager::{CloseReason, ConnectionHandle, ConnectionRegistry};
use crate::metrics::MessageMetrics;
use crate::push::{EncodedFrame, PushFrame};

use super::NotificationEvent;

/// Maximum number of concurrent writes during a tenant broadcast
const MAX_CONCURRENT_SENDS: usize = 100;

/// Default upper bound for a single write
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Statistics for the broadcaster
#[derive(Debug, Default)]
pub struct BroadcasterStats {
    /// Notifications handed to the broadcaster
    pub total_sent: AtomicU64,
    /// Successful writes (connection count)
    pub total_delivered: AtomicU64,
    /// Failed writes; each one evicted its connection
    pub total_failed: AtomicU64,
    pub user_notifications: AtomicU64,
    pub tenant_notifications: AtomicU64,
    /// Single-user sends with nobody listening
    pub no_listener: AtomicU64,
}

impl BroadcasterStats {
    pub fn snapshot(&self) -> BroadcasterStatsSnapshot {
        BroadcasterStatsSnapshot {
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            user_notifications: self.user_notifications.load(Ordering::Relaxed),
            tenant_notifications: self.tenant_notifications.load(Ordering::Relaxed),
            no_listener: self.no_listener.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of broadcaster statistics
#[derive(Debug, Clone, Serialize)]
pub struct BroadcasterStatsSnapshot {
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub user_notifications: u64,
    pub tenant_notifications: u64,
    pub no_listener: u64,
}

/// Delivers notifications to one user or every connected user of a tenant.
///
/// Delivery is best-effort and at-most-once per connection. A failed write
/// evicts that connection and never affects delivery to the others.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
    stats: BroadcasterStats,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_send_timeout(registry, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_send_timeout(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
            stats: BroadcasterStats::default(),
        }
    }

    pub fn stats(&self) -> BroadcasterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Send a notification to a single user's connection.
    ///
    /// Returns `false` when nobody is listening or the write failed.
    #[tracing::instrument(
        name = "broadcaster.send_to_user",
        skip(self, event),
        fields(notification_id = %event.id, event_type = %event.event_type)
    )]
    pub async fn send_to_user(&self, tenant_id: &str, user_id: &str, event: NotificationEvent) -> bool {
        self.stats.total_sent.fetch_add(1, Ordering::Relaxed);
        self.stats.user_notifications.fetch_add(1, Ordering::Relaxed);
        MessageMetrics::record_user_sent();

        let Some(handle) = self.registry.get(tenant_id, user_id) else {
            self.stats.no_listener.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("No active listener for user");
            return false;
        };

        let Some(frame) = encode(event) else {
            return false;
        };

        let delivered = self.deliver(&handle, &frame).await;
        self.record(usize::from(delivered), usize::from(!delivered));
        delivered
    }

    /// Send a notification to every registered user of a tenant.
    ///
    /// Returns the number of connections the notification was written to.
    #[tracing::instrument(
        name = "broadcaster.broadcast_to_tenant",
        skip(self, event),
        fields(notification_id = %event.id, event_type = %event.event_type)
    )]
    pub async fn broadcast_to_tenant(&self, tenant_id: &str, event: NotificationEvent) -> usize {
        self.stats.total_sent.fetch_add(1, Ordering::Relaxed);
        self.stats.tenant_notifications.fetch_add(1, Ordering::Relaxed);
        MessageMetrics::record_tenant_sent();

        let snapshot = self.registry.snapshot_tenant(tenant_id);
        if snapshot.is_empty() {
            tracing::debug!("No connections registered for tenant");
            return 0;
        }

        let Some(frame) = encode(event) else {
            return 0;
        };

        let (delivered, failed) = self
            .send_to_connections(snapshot.iter().map(|(_, handle)| handle), &frame)
            .await;
        self.record(delivered, failed);

        tracing::debug!(
            recipients = snapshot.len(),
            delivered = delivered,
            failed = failed,
            "Broadcast notification to tenant"
        );

        delivered
    }

    /// Write one frame to many connections with bounded parallelism
    async fn send_to_connections<'a>(
        &self,
        connections: impl Iterator<Item = &'a Arc<ConnectionHandle>>,
        frame: &EncodedFrame,
    ) -> (usize, usize) {
        let mut in_flight = FuturesUnordered::new();
        let mut delivered = 0;
        let mut failed = 0;

        for handle in connections {
            in_flight.push(self.deliver(handle, frame));

            // Process completed writes when we hit the concurrency limit
            while in_flight.len() >= MAX_CONCURRENT_SENDS {
                match in_flight.next().await {
                    Some(true) => delivered += 1,
                    Some(false) => failed += 1,
                    None => break,
                }
            }
        }

        while let Some(ok) = in_flight.next().await {
            if ok {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        (delivered, failed)
    }

    /// Write to one connection, evicting it if the write fails
    async fn deliver(&self, handle: &Arc<ConnectionHandle>, frame: &EncodedFrame) -> bool {
        match handle.send(frame, self.send_timeout).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    connection_id = %handle.id,
                    key = %handle.key,
                    error = %e,
                    "Push write failed, evicting connection"
                );
                self.registry.remove_connection(handle, CloseReason::SendFailed);
                false
            }
        }
    }

    fn record(&self, delivered: usize, failed: usize) {
        self.stats.total_delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats.total_failed.fetch_add(failed as u64, Ordering::Relaxed);
        MessageMetrics::record_delivered(delivered as u64);
        MessageMetrics::record_failed(failed as u64);
    }
}

fn encode(event: NotificationEvent) -> Option<EncodedFrame> {
    let notification_id = event.id;
    match PushFrame::Notification(event).encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(
                notification_id = %notification_id,
                error = %e,
                "Notification dropped before delivery"
            );
            None
        }
    }
}
