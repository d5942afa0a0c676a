//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod notifications;
mod routes;

pub use health::{health, stats, tenant_stats};
pub use metrics::prometheus_metrics;
pub use notifications::{
    notify_tenant, notify_user, publish_email_status, NotificationPayload,
    NotifyTenantRequest, NotifyTenantResponse, NotifyUserRequest, NotifyUserResponse,
    PublishEmailStatusRequest,
};
pub use routes::api_routes;
