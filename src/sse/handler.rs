//! SSE handler implementation.

use std::convert::Infallible;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::Stream;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::StreamIdentity;
use crate::error::AppError;
use crate::push::PushStream;
use crate::server::AppState;

/// Query parameters for SSE endpoint
#[derive(Debug, Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

/// Durable notification stream for an authenticated user
#[tracing::instrument(
    name = "sse.connect",
    skip(state, query, headers),
    fields(has_query_token = query.token.is_some())
)]
pub async fn sse_handler(
    State(state): State<AppState>,
    Query(query): Query<SseQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = extract_token(&query, &headers)
        .ok_or_else(|| AppError::Auth("Missing authentication token".to_string()))?;

    let StreamIdentity { tenant_id, user_id } =
        state.jwt_validator.authenticate(&token).map_err(|e| {
            tracing::warn!(error = %e, "SSE authentication failed");
            e
        })?;

    let stream = state.hub.register_default(&tenant_id, &user_id);

    tracing::info!(
        connection_id = %stream.connection_id(),
        tenant_id = %tenant_id,
        user_id = %user_id,
        "SSE connection established"
    );

    let guard = StreamGuard::new(stream.connection_id(), format!("{tenant_id}/{user_id}"));
    Ok(Sse::new(event_stream(stream, guard)).into_response())
}

/// Email status stream for a pending signup or login email
#[tracing::instrument(name = "sse.email_status", skip(state))]
pub async fn email_status_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    if key.trim().is_empty() {
        return Err(AppError::Validation("Email status key must not be empty".to_string()));
    }

    let stream = state.hub.create_email_status_channel(&key);

    tracing::debug!(
        connection_id = %stream.connection_id(),
        key = %key,
        "Email status stream opened"
    );

    let guard = StreamGuard::new(stream.connection_id(), format!("ephemeral:{key}"));
    Ok(Sse::new(event_stream(stream, guard)).into_response())
}

/// Extract token from query parameter or Authorization header
fn extract_token(query: &SseQuery, headers: &HeaderMap) -> Option<String> {
    // First try query parameter
    if let Some(ref token) = query.token {
        return Some(token.clone());
    }

    // Then try Authorization header
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Drain a push stream as SSE events, logging when the response ends
fn event_stream(
    mut stream: PushStream,
    guard: StreamGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        // Dropped when the client goes away or the connection is closed
        let _guard = guard;

        while let Some(frame) = stream.recv().await {
            yield Ok(frame.to_sse_event());
        }
    }
}

/// Logs the lifetime of one SSE response.
///
/// Registry cleanup is not done here: dropping the `PushStream` lets the
/// connection's lifecycle watcher release it.
struct StreamGuard {
    connection_id: Uuid,
    key: String,
    opened_at: Instant,
}

impl StreamGuard {
    fn new(connection_id: Uuid, key: String) -> Self {
        Self {
            connection_id,
            key,
            opened_at: Instant::now(),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        tracing::info!(
            connection_id = %self.connection_id,
            key = %self.key,
            duration_secs = self.opened_at.elapsed().as_secs_f64(),
            "SSE connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_query() {
        let query = SseQuery {
            token: Some("my-token".to_string()),
        };
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&query, &headers), Some("my-token".to_string()));
    }

    #[test]
    fn test_extract_token_from_header() {
        let query = SseQuery { token: None };
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Bearer header-token".parse().unwrap(),
        );
        assert_eq!(extract_token(&query, &headers), Some("header-token".to_string()));
    }

    #[test]
    fn test_extract_token_query_takes_precedence() {
        let query = SseQuery {
            token: Some("query-token".to_string()),
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Bearer header-token".parse().unwrap(),
        );
        assert_eq!(extract_token(&query, &headers), Some("query-token".to_string()));
    }

    #[test]
    fn test_extract_token_ignores_other_schemes() {
        let query = SseQuery { token: None };
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(extract_token(&query, &headers), None);
    }

    #[test]
    fn test_extract_token_none() {
        let query = SseQuery { token: None };
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&query, &headers), None);
    }
}
