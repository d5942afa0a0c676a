//! Health check and statistics endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::connection_manager::{ConnectionStats, TenantConnectionStats};
use crate::notification::BroadcasterStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub notifications: BroadcasterStatsSnapshot,
    pub email_status_channels: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connections: state.hub.total_connection_count(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.hub.connection_stats(),
        notifications: state.hub.broadcaster_stats(),
        email_status_channels: state.hub.email_status_channel_count(),
    })
}

/// GET /stats/tenants/{tenant_id}
#[tracing::instrument(name = "http.tenant_stats", skip(state))]
pub async fn tenant_stats(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Json<TenantConnectionStats> {
    Json(state.hub.tenant_stats(&tenant_id))
}
