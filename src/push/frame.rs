use std::sync::Arc;

use axum::response::sse::Event;
use serde::Serialize;

use crate::email_status::EmailStatus;
use crate::error::StreamError;
use crate::notification::NotificationEvent;

/// Event name for notification frames
pub const NOTIFICATION_EVENT: &str = "notification";
/// Event name for keep-alive frames
pub const HEARTBEAT_EVENT: &str = "heartbeat";
/// Event name for email status frames
pub const EMAIL_STATUS_EVENT: &str = "email-status";

/// Literal body of every heartbeat frame
pub const HEARTBEAT_PAYLOAD: &str = "ping";

/// Frames pushed from the server to a connected client
#[derive(Debug, Clone)]
pub enum PushFrame {
    Notification(NotificationEvent),
    Heartbeat,
    EmailStatus { status: EmailStatus, message: String },
}

#[derive(Serialize)]
struct EmailStatusBody<'a> {
    status: EmailStatus,
    message: &'a str,
}

impl PushFrame {
    pub fn email_status(status: EmailStatus, message: impl Into<String>) -> Self {
        Self::EmailStatus {
            status,
            message: message.into(),
        }
    }

    /// SSE event name this frame is delivered under
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Notification(_) => NOTIFICATION_EVENT,
            Self::Heartbeat => HEARTBEAT_EVENT,
            Self::EmailStatus { .. } => EMAIL_STATUS_EVENT,
        }
    }

    /// Encode the frame body once so it can be shared between many connections
    pub fn encode(&self) -> Result<EncodedFrame, StreamError> {
        let data = match self {
            Self::Notification(event) => serde_json::to_string(event)?,
            Self::Heartbeat => HEARTBEAT_PAYLOAD.to_string(),
            Self::EmailStatus { status, message } => serde_json::to_string(&EmailStatusBody {
                status: *status,
                message,
            })?,
        };

        Ok(EncodedFrame {
            event: self.event_name(),
            data: Arc::from(data),
        })
    }
}

/// A frame whose body has already been serialized.
///
/// Cloning is cheap, the body is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    event: &'static str,
    data: Arc<str>,
}

impl EncodedFrame {
    pub fn heartbeat() -> Self {
        Self {
            event: HEARTBEAT_EVENT,
            data: Arc::from(HEARTBEAT_PAYLOAD),
        }
    }

    pub fn event(&self) -> &'static str {
        self.event
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn is_heartbeat(&self) -> bool {
        self.event == HEARTBEAT_EVENT
    }

    pub fn to_sse_event(&self) -> Event {
        Event::default().event(self.event).data(self.data.as_ref())
    }
}
