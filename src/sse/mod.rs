//! Server-Sent Events transport for push streams.
//!
//! # Endpoints
//!
//! `GET /sse?token=<JWT_TOKEN>` or `GET /sse` with
//! `Authorization: Bearer <JWT_TOKEN>` opens the durable stream for the
//! token's tenant and user.
//!
//! `GET /email-status/{key}` opens an unauthenticated email status stream
//! that ends after a terminal status or one minute of silence.
//!
//! # Event Types
//!
//! - `notification` - Notification event with JSON payload
//! - `heartbeat` - Keep-alive event, data `ping`
//! - `email-status` - `{status, message}` for email status streams

mod handler;

pub use handler::{email_status_handler, sse_handler, SseQuery};
