use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::health::{health, stats, tenant_stats};
use super::metrics::prometheus_metrics;
use super::notifications::{notify_tenant, notify_user, publish_email_status};

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/stats/tenants/{tenant_id}", get(tenant_stats))
        .route("/metrics", get(prometheus_metrics))
        // Producer endpoints
        .nest(
            "/api/v1",
            Router::new()
                .route("/notifications/user", post(notify_user))
                .route("/notifications/tenant", post(notify_tenant))
                .route("/email-status", post(publish_email_status))
                .route_layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
