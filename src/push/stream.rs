//! Receiving end of a push stream.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::EncodedFrame;

/// The transport-facing half of a registered connection.
///
/// Frames arrive in the order they were sent on the connection. Once the
/// registry closes the connection, frames already buffered are still handed
/// out and then the stream ends.
#[derive(Debug)]
pub struct PushStream {
    connection_id: Uuid,
    receiver: mpsc::Receiver<EncodedFrame>,
    closed: CancellationToken,
}

impl PushStream {
    pub(crate) fn new(
        connection_id: Uuid,
        receiver: mpsc::Receiver<EncodedFrame>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            connection_id,
            receiver,
            closed,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Whether the owning connection has been closed by the registry
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Wait for the next frame, or `None` once the connection is closed and drained
    pub async fn recv(&mut self) -> Option<EncodedFrame> {
        tokio::select! {
            biased;
            frame = self.receiver.recv() => frame,
            _ = self.closed.cancelled() => self.drain_one(),
        }
    }

    /// Take a buffered frame without waiting
    pub fn try_recv(&mut self) -> Option<EncodedFrame> {
        self.receiver.try_recv().ok()
    }

    /// Drain every frame currently buffered
    pub fn drain(&mut self) -> Vec<EncodedFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.receiver.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn drain_one(&mut self) -> Option<EncodedFrame> {
        let frame = self.receiver.try_recv().ok();
        if frame.is_none() {
            self.receiver.close();
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::connection_manager::{CloseReason, ConnectionHandle, ConnectionKey};
    use crate::push::EncodedFrame;

    #[tokio::test]
    async fn test_buffered_frames_survive_close() {
        let (handle, mut stream) =
            ConnectionHandle::open(ConnectionKey::ephemeral("k"), Duration::from_secs(60), 4);

        handle.try_send(&EncodedFrame::heartbeat()).unwrap();
        handle.try_send(&EncodedFrame::heartbeat()).unwrap();
        assert!(handle.close(CloseReason::Completed));
        assert!(stream.is_closed());

        assert!(stream.recv().await.is_some());
        assert!(stream.recv().await.is_some());
        assert_eq!(stream.recv().await, None);
        assert_eq!(stream.recv().await, None);
    }

    #[tokio::test]
    async fn test_recv_waits_for_frame() {
        let (handle, mut stream) =
            ConnectionHandle::open(ConnectionKey::durable("t", "u"), Duration::from_secs(60), 4);

        let reader = tokio::spawn(async move { stream.recv().await });
        tokio::task::yield_now().await;
        handle
            .send(&EncodedFrame::heartbeat(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(reader.await.unwrap(), Some(EncodedFrame::heartbeat()));
    }
}
