use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::connection_manager::{
    spawn_watcher, CloseReason, ConnectionHandle, ConnectionKey, ConnectionOwner,
    DEFAULT_BUFFER_SIZE,
};
use crate::error::StreamError;
use crate::metrics::{ConnectionMetrics, EmailStatusMetrics};
use crate::notification::DEFAULT_SEND_TIMEOUT;
use crate::push::{PushFrame, PushStream};

use super::EmailStatus;

/// Lifetime of an email status channel when none is given
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-owner map of short-lived, unauthenticated status streams.
///
/// A channel leaves the map exactly once: when a terminal status is
/// published, when its timeout elapses, or when a new channel is created
/// for the same key.
pub struct EphemeralStatusRegistry {
    channels: DashMap<String, Arc<ConnectionHandle>>,
    channel_timeout: Duration,
    send_timeout: Duration,
}

impl EphemeralStatusRegistry {
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CHANNEL_TIMEOUT, DEFAULT_SEND_TIMEOUT)
    }

    pub fn with_timeouts(channel_timeout: Duration, send_timeout: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            channel_timeout,
            send_timeout,
        }
    }

    /// Open a channel for `key` with the default timeout
    pub fn create_channel(self: &Arc<Self>, key: &str) -> PushStream {
        self.create_channel_with_timeout(key, self.channel_timeout)
    }

    /// Open a channel for `key`, completing any channel already open for it
    pub fn create_channel_with_timeout(self: &Arc<Self>, key: &str, timeout: Duration) -> PushStream {
        let (handle, stream) =
            ConnectionHandle::open(ConnectionKey::ephemeral(key), timeout, DEFAULT_BUFFER_SIZE);
        let handle = Arc::new(handle);

        let replaced = match self.channels.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(handle.clone());
                previous.close(CloseReason::Replaced);
                Some(previous)
            }
            Entry::Vacant(entry) => {
                entry.insert(handle.clone());
                None
            }
        };

        if let Some(previous) = replaced {
            tracing::debug!(
                key = %key,
                old_connection_id = %previous.id,
                "Replaced existing email status channel"
            );
        }

        let owner: Weak<Self> = Arc::downgrade(self);
        spawn_watcher(owner, handle.clone());

        ConnectionMetrics::record_registered(handle.key.kind());
        tracing::debug!(
            key = %key,
            connection_id = %handle.id,
            timeout_secs = timeout.as_secs(),
            "Email status channel opened"
        );

        stream
    }

    /// Push a status to the channel for `key`.
    ///
    /// Silently does nothing when no channel is open. A terminal status
    /// completes and removes the channel right after it is written.
    pub async fn publish(&self, key: &str, status: EmailStatus, message: &str) {
        // Taking a terminal status' channel out of the map first guarantees
        // at most one terminal event per key
        let handle = if status.is_terminal() {
            self.channels.remove(key).map(|(_, handle)| handle)
        } else {
            self.channels.get(key).map(|handle| handle.clone())
        };

        let Some(handle) = handle else {
            tracing::debug!(key = %key, status = %status, "No listener for email status");
            return;
        };

        match self.write_status(&handle, status, message).await {
            Ok(()) => {
                EmailStatusMetrics::record_published(status);
                if status.is_terminal() && handle.close(CloseReason::Completed) {
                    tracing::debug!(key = %key, status = %status, "Email status channel completed");
                }
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    status = %status,
                    error = %e,
                    "Email status write failed, removing channel"
                );
                self.release(&handle, CloseReason::SendFailed);
            }
        }
    }

    async fn write_status(
        &self,
        handle: &ConnectionHandle,
        status: EmailStatus,
        message: &str,
    ) -> Result<(), StreamError> {
        let frame = PushFrame::email_status(status, message).encode()?;
        handle.send(&frame, self.send_timeout).await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.channels.contains_key(key)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Close and remove every open channel
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let handles: Vec<_> = self.channels.iter().map(|entry| entry.value().clone()).collect();
        let mut closed = 0;
        for handle in handles {
            if self.remove_channel(&handle, reason) {
                closed += 1;
            }
        }
        closed
    }

    fn remove_channel(&self, handle: &Arc<ConnectionHandle>, reason: CloseReason) -> bool {
        if let ConnectionKey::Ephemeral(key) = &handle.key {
            self.channels.remove_if(key, |_, current| current.id == handle.id);
        }
        handle.close(reason)
    }
}

impl ConnectionOwner for EphemeralStatusRegistry {
    fn release(&self, handle: &Arc<ConnectionHandle>, reason: CloseReason) {
        if self.remove_channel(handle, reason) {
            tracing::debug!(
                connection_id = %handle.id,
                key = %handle.key,
                reason = reason.as_str(),
                "Email status channel closed"
            );
        }
    }
}

impl Default for EphemeralStatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}
