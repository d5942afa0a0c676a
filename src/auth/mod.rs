//! JWT authentication for durable push connections.

mod claims;
mod jwt;

pub use claims::{Claims, StreamIdentity, DEFAULT_TENANT_ID};
pub use jwt::JwtValidator;
