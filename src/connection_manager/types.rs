//! Connection handle and related types

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::StreamError;
use crate::metrics::ConnectionMetrics;
use crate::push::{EncodedFrame, PushStream};

/// Identity a connection is registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionKey {
    /// Long-lived stream for an authenticated user of a tenant
    Durable { tenant_id: String, user_id: String },
    /// Short-lived unauthenticated stream keyed by an opaque string
    Ephemeral(String),
}

impl ConnectionKey {
    pub fn durable(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::Durable {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn ephemeral(key: impl Into<String>) -> Self {
        Self::Ephemeral(key.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Durable { .. } => "durable",
            Self::Ephemeral(_) => "ephemeral",
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable { tenant_id, user_id } => write!(f, "{}/{}", tenant_id, user_id),
            Self::Ephemeral(key) => write!(f, "ephemeral:{}", key),
        }
    }
}

/// Why a connection left the open state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A newer registration took over the same key
    Replaced,
    /// Terminal status delivered on an ephemeral channel
    Completed,
    /// Idle timeout elapsed
    Expired,
    /// The client side of the stream went away
    TransportClosed,
    /// A write failed or timed out
    SendFailed,
    /// Evicted by the heartbeat sweep
    Stale,
    /// Explicit removal by key
    Removed,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::TransportClosed => "transport_closed",
            Self::SendFailed => "send_failed",
            Self::Stale => "stale",
            Self::Removed => "removed",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionState {
    Open,
    Closed,
}

/// Handle for a single registered push connection.
///
/// Owned by the registry it was registered with. Code outside the registry
/// should keep the [`ConnectionKey`], not the handle.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub key: ConnectionKey,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<EncodedFrame>,
    opened_at: Instant,
    idle_timeout: Duration,
    /// Milliseconds since `opened_at` of the last successful write or touch
    last_activity_ms: AtomicU64,
    open: AtomicBool,
    close_reason: OnceLock<CloseReason>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a connection together with the stream the transport will drain
    pub fn open(key: ConnectionKey, idle_timeout: Duration, buffer_size: usize) -> (Self, PushStream) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let closed = CancellationToken::new();
        let id = Uuid::new_v4();

        let handle = Self {
            id,
            key,
            connected_at: Utc::now(),
            sender,
            opened_at: Instant::now(),
            idle_timeout,
            last_activity_ms: AtomicU64::new(0),
            open: AtomicBool::new(true),
            close_reason: OnceLock::new(),
            closed: closed.clone(),
        };

        (handle, PushStream::new(id, receiver, closed))
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_open() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Record activity on the connection
    pub fn touch(&self) {
        let elapsed = self.opened_at.elapsed().as_millis() as u64;
        self.last_activity_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> Instant {
        self.opened_at + Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }

    /// Time since the last recorded activity, measured against `now`
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// Close the connection. Returns `true` only for the call that performed the close.
    pub fn close(&self, reason: CloseReason) -> bool {
        if self
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let _ = self.close_reason.set(reason);
        self.closed.cancel();
        ConnectionMetrics::record_closed(self.key.kind(), reason);
        true
    }

    /// Write a frame, waiting at most `timeout` for buffer space
    pub async fn send(&self, frame: &EncodedFrame, timeout: Duration) -> Result<(), StreamError> {
        if !self.is_open() {
            return Err(StreamError::Closed);
        }

        match tokio::time::timeout(timeout, self.sender.send(frame.clone())).await {
            Ok(Ok(())) => {
                self.touch();
                Ok(())
            }
            Ok(Err(_)) => Err(StreamError::Closed),
            Err(_) => Err(StreamError::Timeout(timeout)),
        }
    }

    /// Write a frame only if buffer space is available right now
    pub fn try_send(&self, frame: &EncodedFrame) -> Result<(), StreamError> {
        if !self.is_open() {
            return Err(StreamError::Closed);
        }

        match self.sender.try_send(frame.clone()) {
            Ok(()) => {
                self.touch();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(StreamError::Timeout(Duration::ZERO)),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(StreamError::Closed),
        }
    }

    /// Resolves once the connection has been closed
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Resolves once the transport has dropped its end of the stream
    pub async fn transport_closed(&self) {
        self.sender.closed().await
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state())
            .field("close_reason", &self.close_reason())
            .finish()
    }
}
