//! Wire framing and the push stream primitive.
//!
//! Each push is a named event with a text body:
//!
//! - `notification` - JSON encoded notification event
//! - `heartbeat` - literal `ping`
//! - `email-status` - `{"status": ..., "message": ...}`

mod frame;
mod stream;

pub use frame::{
    EncodedFrame, PushFrame, EMAIL_STATUS_EVENT, HEARTBEAT_EVENT, HEARTBEAT_PAYLOAD,
    NOTIFICATION_EVENT,
};
pub use stream::PushStream;
