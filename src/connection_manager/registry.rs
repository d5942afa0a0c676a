use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;

use crate::metrics::ConnectionMetrics;
use crate::push::{EncodedFrame, PushStream};

use super::lifecycle::{spawn_watcher, ConnectionOwner};
use super::{
    CloseReason, ConnectionHandle, ConnectionKey, ConnectionStats, TenantConnectionStats,
};

/// Default per-connection frame buffer
pub const DEFAULT_BUFFER_SIZE: usize = 32;

/// Concurrent two-level index of durable push connections: tenant -> user -> connection.
///
/// Each tenant owns its own inner map, so work on one tenant never waits on a
/// lock held for another tenant's users. At most one connection is registered
/// per `(tenant, user)`; a connection is always closed when it leaves the map.
pub struct ConnectionRegistry {
    /// tenant_id -> (user_id -> ConnectionHandle)
    tenants: DashMap<String, DashMap<String, Arc<ConnectionHandle>>>,
    buffer_size: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            tenants: DashMap::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Register a durable connection for `(tenant_id, user_id)`.
    ///
    /// Any connection already registered under the same key is closed and
    /// replaced. The returned stream starts with one heartbeat frame so the
    /// client can confirm liveness right away.
    pub fn register(
        self: &Arc<Self>,
        tenant_id: &str,
        user_id: &str,
        idle_timeout: Duration,
    ) -> PushStream {
        let key = ConnectionKey::durable(tenant_id, user_id);
        let (handle, stream) = ConnectionHandle::open(key, idle_timeout, self.buffer_size);
        let handle = Arc::new(handle);

        // Fresh buffer, cannot be full
        if let Err(e) = handle.try_send(&EncodedFrame::heartbeat()) {
            tracing::debug!(connection_id = %handle.id, error = %e, "Initial heartbeat not buffered");
        }

        let replaced = {
            // The outer entry guard serializes with empty-shard pruning
            let shard = self.tenants.entry(tenant_id.to_string()).or_default();
            let previous = shard.insert(user_id.to_string(), handle.clone());
            if let Some(previous) = &previous {
                previous.close(CloseReason::Replaced);
            }
            previous
        };

        if let Some(previous) = replaced {
            tracing::info!(
                tenant_id = %tenant_id,
                user_id = %user_id,
                old_connection_id = %previous.id,
                connection_id = %handle.id,
                "Replaced existing push connection"
            );
        }

        let owner: Weak<Self> = Arc::downgrade(self);
        spawn_watcher(owner, handle.clone());

        ConnectionMetrics::record_registered(handle.key.kind());
        tracing::info!(
            connection_id = %handle.id,
            tenant_id = %tenant_id,
            user_id = %user_id,
            timeout_ms = idle_timeout.as_millis() as u64,
            "Push connection registered"
        );

        stream
    }

    /// Remove and close the connection for `(tenant_id, user_id)`. No-op if absent.
    pub fn remove(&self, tenant_id: &str, user_id: &str) {
        let removed = self
            .tenants
            .get(tenant_id)
            .and_then(|shard| shard.remove(user_id).map(|(_, handle)| handle));

        if let Some(handle) = removed {
            handle.close(CloseReason::Removed);
            self.prune_tenant(tenant_id);
            tracing::info!(
                connection_id = %handle.id,
                tenant_id = %tenant_id,
                user_id = %user_id,
                "Push connection removed"
            );
        }
    }

    /// Remove `handle` only if it is still the connection registered under its
    /// key, then close it with `reason`.
    ///
    /// Returns `true` if this call closed the connection.
    pub fn remove_connection(&self, handle: &Arc<ConnectionHandle>, reason: CloseReason) -> bool {
        if let ConnectionKey::Durable { tenant_id, user_id } = &handle.key {
            let removed = self
                .tenants
                .get(tenant_id)
                .map(|shard| shard.remove_if(user_id, |_, current| current.id == handle.id).is_some())
                .unwrap_or(false);

            if removed {
                self.prune_tenant(tenant_id);
            }
        }

        let closed = handle.close(reason);
        if closed {
            tracing::info!(
                connection_id = %handle.id,
                key = %handle.key,
                reason = reason.as_str(),
                "Push connection evicted"
            );
        }
        closed
    }

    /// Look up the live connection for a user
    pub(crate) fn get(&self, tenant_id: &str, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        let shard = self.tenants.get(tenant_id)?;
        let handle = shard.get(user_id).map(|h| h.clone());
        handle
    }

    pub fn contains(&self, tenant_id: &str, user_id: &str) -> bool {
        self.get(tenant_id, user_id).is_some()
    }

    /// Point-in-time copy of a tenant's connections, ordered by user id.
    ///
    /// Safe to iterate while registrations and removals continue. Handles
    /// must not be kept beyond the operation that took the snapshot.
    pub fn snapshot_tenant(&self, tenant_id: &str) -> Vec<(String, Arc<ConnectionHandle>)> {
        let Some(shard) = self.tenants.get(tenant_id) else {
            return Vec::new();
        };
        let mut entries: Vec<_> = shard
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        drop(shard);

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Point-in-time copy of every registered connection
    pub fn snapshot_all(&self) -> Vec<Arc<ConnectionHandle>> {
        let mut all = Vec::new();
        for shard in self.tenants.iter() {
            all.extend(shard.value().iter().map(|entry| entry.value().clone()));
        }
        all
    }

    pub fn connection_count(&self, tenant_id: &str) -> usize {
        self.tenants
            .get(tenant_id)
            .map(|shard| shard.len())
            .unwrap_or(0)
    }

    /// Approximate total across all tenants
    pub fn total_connection_count(&self) -> usize {
        self.tenants.iter().map(|shard| shard.value().len()).sum()
    }

    pub fn stats(&self) -> ConnectionStats {
        let mut tenants: Vec<TenantConnectionStats> = self
            .tenants
            .iter()
            .map(|shard| TenantConnectionStats {
                tenant_id: shard.key().clone(),
                connections: shard.value().len(),
            })
            .filter(|t| t.connections > 0)
            .collect();
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));

        ConnectionStats {
            total_connections: tenants.iter().map(|t| t.connections).sum(),
            tenant_count: tenants.len(),
            tenants,
        }
    }

    pub fn tenant_stats(&self, tenant_id: &str) -> TenantConnectionStats {
        TenantConnectionStats {
            tenant_id: tenant_id.to_string(),
            connections: self.connection_count(tenant_id),
        }
    }

    /// Close and remove every connection. Returns how many were closed.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let mut closed = 0;
        for handle in self.snapshot_all() {
            if self.remove_connection(&handle, reason) {
                closed += 1;
            }
        }
        closed
    }

    /// Drop a tenant's shard once it is empty.
    ///
    /// `remove_if` takes the same write lock `register` holds while inserting,
    /// so a concurrent registration can never land in a discarded shard.
    fn prune_tenant(&self, tenant_id: &str) {
        self.tenants.remove_if(tenant_id, |_, shard| shard.is_empty());
    }
}

impl ConnectionOwner for ConnectionRegistry {
    fn release(&self, handle: &Arc<ConnectionHandle>, reason: CloseReason) {
        self.remove_connection(handle, reason);
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::ConnectionState;

    const TIMEOUT: Duration = Duration::from_secs(3600);

    fn registry() -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new())
    }

    #[tokio::test]
    async fn test_register_sends_initial_heartbeat() {
        let registry = registry();
        let mut stream = registry.register("gym-1", "alice", TIMEOUT);

        let frame = stream.try_recv().expect("initial heartbeat");
        assert!(frame.is_heartbeat());
        assert_eq!(frame.data(), "ping");
        assert_eq!(registry.connection_count("gym-1"), 1);
    }

    #[tokio::test]
    async fn test_register_replaces_existing_connection() {
        let registry = registry();
        let first = registry.register("gym-1", "alice", TIMEOUT);
        let first_handle = registry.get("gym-1", "alice").unwrap();

        let second = registry.register("gym-1", "alice", TIMEOUT);
        let second_handle = registry.get("gym-1", "alice").unwrap();

        assert_eq!(registry.connection_count("gym-1"), 1);
        assert_eq!(first_handle.state(), ConnectionState::Closed);
        assert_eq!(first_handle.close_reason(), Some(CloseReason::Replaced));
        assert!(first.is_closed());

        assert_eq!(second_handle.state(), ConnectionState::Open);
        assert_eq!(second_handle.id, second.connection_id());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = registry();
        let stream = registry.register("gym-1", "alice", TIMEOUT);

        registry.remove("gym-1", "alice");
        registry.remove("gym-1", "alice");
        registry.remove("gym-2", "nobody");

        assert!(stream.is_closed());
        assert_eq!(registry.connection_count("gym-1"), 0);
        assert_eq!(registry.stats().tenant_count, 0);
    }

    #[tokio::test]
    async fn test_remove_connection_spares_replacement() {
        let registry = registry();
        let _first = registry.register("gym-1", "alice", TIMEOUT);
        let stale = registry.get("gym-1", "alice").unwrap();
        let _second = registry.register("gym-1", "alice", TIMEOUT);

        // Already closed by the replacement; must not touch the new occupant
        assert!(!registry.remove_connection(&stale, CloseReason::SendFailed));
        assert!(registry.contains("gym-1", "alice"));
        assert_eq!(stale.close_reason(), Some(CloseReason::Replaced));
    }

    #[tokio::test]
    async fn test_snapshot_is_ordered_and_isolated() {
        let registry = registry();
        let _c = registry.register("gym-1", "carol", TIMEOUT);
        let _a = registry.register("gym-1", "alice", TIMEOUT);
        let _b = registry.register("gym-1", "bob", TIMEOUT);
        let _other = registry.register("gym-2", "dave", TIMEOUT);

        let snapshot = registry.snapshot_tenant("gym-1");
        let users: Vec<_> = snapshot.iter().map(|(user, _)| user.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob", "carol"]);

        registry.remove("gym-1", "bob");
        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.connection_count("gym-1"), 2);
        assert!(registry.snapshot_tenant("unknown").is_empty());
    }

    #[tokio::test]
    async fn test_counts_and_stats() {
        let registry = registry();
        let _s1 = registry.register("gym-1", "alice", TIMEOUT);
        let _s2 = registry.register("gym-1", "bob", TIMEOUT);
        let _s3 = registry.register("gym-2", "carol", TIMEOUT);

        assert_eq!(registry.connection_count("gym-1"), 2);
        assert_eq!(registry.connection_count("gym-2"), 1);
        assert_eq!(registry.total_connection_count(), 3);

        let stats = registry.stats();
        assert_eq!(stats.total_connections, 3);
        assert_eq!(stats.tenant_count, 2);
        assert_eq!(stats.tenants[0].tenant_id, "gym-1");
        assert_eq!(stats.tenants[0].connections, 2);

        assert_eq!(registry.tenant_stats("gym-2").connections, 1);
        assert_eq!(registry.tenant_stats("gym-9").connections, 0);
    }

    #[tokio::test]
    async fn test_dropped_transport_is_released() {
        let registry = registry();
        let stream = registry.register("gym-1", "alice", TIMEOUT);
        let handle = registry.get("gym-1", "alice").unwrap();

        drop(stream);
        tokio::time::timeout(Duration::from_secs(1), handle.closed())
            .await
            .expect("watcher should release the connection");

        assert!(!registry.contains("gym-1", "alice"));
        assert_eq!(handle.close_reason(), Some(CloseReason::TransportClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_expires_connection() {
        let registry = registry();
        let mut stream = registry.register("gym-1", "alice", Duration::from_secs(10));
        let handle = registry.get("gym-1", "alice").unwrap();
        assert!(stream.try_recv().is_some());

        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(!registry.contains("gym-1", "alice"));
        assert_eq!(handle.close_reason(), Some(CloseReason::Expired));
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = registry();
        let s1 = registry.register("gym-1", "alice", TIMEOUT);
        let s2 = registry.register("gym-2", "bob", TIMEOUT);

        assert_eq!(registry.close_all(CloseReason::Shutdown), 2);
        assert_eq!(registry.total_connection_count(), 0);
        assert!(s1.is_closed() && s2.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_keeps_one_per_key() {
        let registry = registry();
        let mut tasks = Vec::new();

        for i in 0..64 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let user = format!("user-{}", i % 8);
                let tenant = format!("gym-{}", i % 2);
                registry.register(&tenant, &user, TIMEOUT)
            }));
        }

        let mut streams = Vec::new();
        for task in tasks {
            streams.push(task.await.unwrap());
        }

        assert_eq!(registry.total_connection_count(), 8);
        let open = streams.iter().filter(|s| !s.is_closed()).count();
        assert_eq!(open, 8);
    }
}
