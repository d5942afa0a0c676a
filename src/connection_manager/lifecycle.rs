//! Per-connection lifecycle watcher.
//!
//! Every registered connection gets one watcher task. It waits on the
//! connection's completion signal and hands the connection back to its owner
//! for removal when the transport goes away or the idle timeout elapses.

use std::sync::{Arc, Weak};

use tokio::time::{sleep_until, Instant};

use super::{CloseReason, ConnectionHandle};

/// A registry that can take back a connection it owns
pub(crate) trait ConnectionOwner: Send + Sync + 'static {
    /// Remove `handle` if it is still the registered occupant of its key, then close it
    fn release(&self, handle: &Arc<ConnectionHandle>, reason: CloseReason);
}

pub(crate) fn spawn_watcher(owner: Weak<dyn ConnectionOwner>, handle: Arc<ConnectionHandle>) {
    tokio::spawn(async move {
        let Some(reason) = wait_for_end(&handle).await else {
            return;
        };

        match owner.upgrade() {
            Some(owner) => owner.release(&handle, reason),
            None => {
                handle.close(reason);
            }
        }
    });
}

/// Returns the reason the connection should be released, or `None` if it
/// was closed through the registry already.
async fn wait_for_end(handle: &ConnectionHandle) -> Option<CloseReason> {
    loop {
        let deadline = handle.last_activity() + handle.idle_timeout();

        tokio::select! {
            _ = handle.closed() => return None,
            _ = handle.transport_closed() => {
                tracing::debug!(
                    connection_id = %handle.id,
                    key = %handle.key,
                    "Push stream dropped by transport"
                );
                return Some(CloseReason::TransportClosed);
            }
            _ = sleep_until(deadline) => {
                if handle.idle_for(Instant::now()) >= handle.idle_timeout() {
                    tracing::debug!(
                        connection_id = %handle.id,
                        key = %handle.key,
                        timeout_ms = handle.idle_timeout().as_millis() as u64,
                        "Push stream idle timeout elapsed"
                    );
                    return Some(CloseReason::Expired);
                }
            }
        }
    }
}
