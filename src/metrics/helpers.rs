//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::connection_manager::{CloseReason, ConnectionStats};
use crate::email_status::EmailStatus;

use super::{
    CONNECTIONS_ACTIVE, CONNECTIONS_CLOSED_TOTAL, CONNECTIONS_REGISTERED_TOTAL,
    EMAIL_STATUS_CHANNELS_ACTIVE, EMAIL_STATUS_PUBLISHED_TOTAL, HEARTBEAT_DURATION_MS,
    HEARTBEAT_FAILURES_TOTAL, MESSAGES_DELIVERED_TOTAL, MESSAGES_FAILED_TOTAL,
    MESSAGES_SENT_TOTAL, TENANTS_CONNECTED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection lifecycle metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_registered(kind: &str) {
        CONNECTIONS_REGISTERED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_closed(kind: &str, reason: CloseReason) {
        CONNECTIONS_CLOSED_TOTAL
            .with_label_values(&[kind, reason.as_str()])
            .inc();
    }

    /// Refresh gauges from a registry snapshot
    pub fn update_from_stats(stats: &ConnectionStats) {
        CONNECTIONS_ACTIVE.set(stats.total_connections as i64);
        TENANTS_CONNECTED.set(stats.tenant_count as i64);
    }
}

/// Helper struct for recording message metrics
pub struct MessageMetrics;

impl MessageMetrics {
    /// Record a notification sent to a single user
    pub fn record_user_sent() {
        MESSAGES_SENT_TOTAL.with_label_values(&["user"]).inc();
    }

    /// Record a notification broadcast to a tenant
    pub fn record_tenant_sent() {
        MESSAGES_SENT_TOTAL.with_label_values(&["tenant"]).inc();
    }

    pub fn record_delivered(count: u64) {
        MESSAGES_DELIVERED_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        MESSAGES_FAILED_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording heartbeat sweep metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_duration_ms(duration_ms: u64) {
        HEARTBEAT_DURATION_MS.observe(duration_ms as f64);
    }

    pub fn record_failures(count: u64) {
        HEARTBEAT_FAILURES_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording email status metrics
pub struct EmailStatusMetrics;

impl EmailStatusMetrics {
    pub fn record_published(status: EmailStatus) {
        EMAIL_STATUS_PUBLISHED_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn set_active_channels(count: usize) {
        EMAIL_STATUS_CHANNELS_ACTIVE.set(count as i64);
    }
}
