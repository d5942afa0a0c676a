//! Ephemeral email status channels used during signup and login flows.

mod registry;
mod status;

pub use registry::{EphemeralStatusRegistry, DEFAULT_CHANNEL_TIMEOUT};
pub use status::{EmailStatus, UnknownEmailStatus};
