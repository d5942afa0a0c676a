//! Producer endpoints: notifications and email status updates.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::email_status::{EmailStatus, UnknownEmailStatus};
use crate::error::{AppError, Result};
use crate::notification::{NotificationBuilder, NotificationEvent, NotificationMetadata, Priority};
use crate::server::AppState;

/// Notification content as sent by producers
#[derive(Debug, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
    /// Event type (e.g., "class.booked")
    pub event_type: Option<String>,
    #[serde(default)]
    pub metadata: NotificationMetadata,
}

impl NotificationPayload {
    fn into_event(self) -> Result<NotificationEvent> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Notification title must not be empty".to_string()));
        }

        let mut builder = NotificationBuilder::new(self.title, self.message)
            .priority(self.priority)
            .metadata(self.metadata);

        if let Some(event_type) = self.event_type {
            builder = builder.event_type(event_type);
        }

        Ok(builder.build())
    }
}

#[derive(Debug, Deserialize)]
pub struct NotifyUserRequest {
    pub tenant_id: String,
    pub user_id: String,
    pub notification: NotificationPayload,
}

#[derive(Debug, Serialize)]
pub struct NotifyUserResponse {
    /// Whether the user had a live connection that accepted the notification
    pub delivered: bool,
}

#[derive(Debug, Deserialize)]
pub struct NotifyTenantRequest {
    pub tenant_id: String,
    pub notification: NotificationPayload,
}

#[derive(Debug, Serialize)]
pub struct NotifyTenantResponse {
    pub delivered_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct PublishEmailStatusRequest {
    pub key: String,
    /// `SENDING`, `SENT` or `FAILED`, any case
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// POST /api/v1/notifications/user
#[tracing::instrument(
    name = "http.notify_user",
    skip(state, request),
    fields(tenant_id = %request.tenant_id, user_id = %request.user_id)
)]
pub async fn notify_user(
    State(state): State<AppState>,
    Json(request): Json<NotifyUserRequest>,
) -> Result<Json<NotifyUserResponse>> {
    let event = request.notification.into_event()?;
    let delivered = state
        .hub
        .notify_user(&request.tenant_id, &request.user_id, event)
        .await;

    Ok(Json(NotifyUserResponse { delivered }))
}

/// POST /api/v1/notifications/tenant
#[tracing::instrument(
    name = "http.notify_tenant",
    skip(state, request),
    fields(tenant_id = %request.tenant_id)
)]
pub async fn notify_tenant(
    State(state): State<AppState>,
    Json(request): Json<NotifyTenantRequest>,
) -> Result<Json<NotifyTenantResponse>> {
    let event = request.notification.into_event()?;
    let delivered_count = state.hub.notify_tenant(&request.tenant_id, event).await;

    Ok(Json(NotifyTenantResponse { delivered_count }))
}

/// POST /api/v1/email-status
///
/// Accepted whether or not anyone is listening on the key.
#[tracing::instrument(name = "http.publish_email_status", skip(state, request), fields(key = %request.key))]
pub async fn publish_email_status(
    State(state): State<AppState>,
    Json(request): Json<PublishEmailStatusRequest>,
) -> Result<StatusCode> {
    let status: EmailStatus = request
        .status
        .parse()
        .map_err(|e: UnknownEmailStatus| AppError::Validation(e.to_string()))?;

    state
        .hub
        .publish_email_status(&request.key, status, &request.message)
        .await;

    Ok(StatusCode::ACCEPTED)
}
