//! Prometheus metrics for the push service.
//!
//! - Connection metrics (active, registered, closed by reason)
//! - Delivery metrics (sent by target, delivered, failed)
//! - Heartbeat sweep metrics
//! - Email status channel metrics

mod helpers;

pub use helpers::{
    encode_metrics, ConnectionMetrics, EmailStatusMetrics, HeartbeatMetrics, MessageMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "push";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of registered durable connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of registered durable push connections"
    ).unwrap();

    /// Number of tenants with at least one connection
    pub static ref TENANTS_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_tenants_connected", METRIC_PREFIX),
        "Number of tenants with at least one connection"
    ).unwrap();

    /// Registrations by connection kind
    pub static ref CONNECTIONS_REGISTERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_connections_registered_total", METRIC_PREFIX),
        "Total connections registered",
        &["kind"]
    ).unwrap();

    /// Closures by connection kind and reason
    pub static ref CONNECTIONS_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total connections closed",
        &["kind", "reason"]
    ).unwrap();

    // ============================================================================
    // Message Metrics
    // ============================================================================

    /// Notifications sent by target type
    pub static ref MESSAGES_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_sent_total", METRIC_PREFIX),
        "Total notifications sent",
        &["target"]
    ).unwrap();

    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total notifications written to connections"
    ).unwrap();

    pub static ref MESSAGES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total notification writes that failed"
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    pub static ref HEARTBEAT_DURATION_MS: Histogram = register_histogram!(
        format!("{}_heartbeat_pass_duration_ms", METRIC_PREFIX),
        "Duration of a heartbeat sweep pass in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    ).unwrap();

    pub static ref HEARTBEAT_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_heartbeat_failures_total", METRIC_PREFIX),
        "Total heartbeat writes that failed"
    ).unwrap();

    // ============================================================================
    // Email Status Metrics
    // ============================================================================

    pub static ref EMAIL_STATUS_CHANNELS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_email_status_channels_active", METRIC_PREFIX),
        "Number of open email status channels"
    ).unwrap();

    /// Email statuses published by status value
    pub static ref EMAIL_STATUS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_email_status_published_total", METRIC_PREFIX),
        "Total email statuses published to a listening channel",
        &["status"]
    ).unwrap();
}
