// Infrastructure layer
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain layer
pub mod connection_manager;
pub mod email_status;
pub mod hub;
pub mod notification;
pub mod push;
pub mod tasks;

// Application layer
pub mod api;
pub mod server;
pub mod sse;

pub use hub::NotificationHub;
