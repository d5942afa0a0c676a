use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form key/value metadata attached to a notification
pub type NotificationMetadata = serde_json::Map<String, serde_json::Value>;

/// Notification event forwarded to connected clients.
///
/// Produced and persisted by business logic elsewhere; this service only
/// serializes and forwards it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Unique identifier for this notification
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    /// Type of event (e.g., "membership.expiring", "payment.failed")
    pub event_type: String,
    #[serde(default)]
    pub metadata: NotificationMetadata,
    /// When the notification was created by its producer
    pub created_at: DateTime<Utc>,
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Builder for creating notification events
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    id: Option<Uuid>,
    title: String,
    message: String,
    priority: Priority,
    event_type: String,
    metadata: NotificationMetadata,
    created_at: Option<DateTime<Utc>>,
}

impl NotificationBuilder {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            message: message.into(),
            priority: Priority::default(),
            event_type: "general".to_string(),
            metadata: NotificationMetadata::new(),
            created_at: None,
        }
    }

    /// Reuse the identifier the producer persisted the notification under
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn metadata(mut self, metadata: NotificationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self) -> NotificationEvent {
        NotificationEvent {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            title: self.title,
            message: self.message,
            priority: self.priority,
            event_type: self.event_type,
            metadata: self.metadata,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl NotificationEvent {
    pub fn builder(title: impl Into<String>, message: impl Into<String>) -> NotificationBuilder {
        NotificationBuilder::new(title, message)
    }
}
