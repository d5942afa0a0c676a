//! Background tasks.

mod heartbeat;

pub use heartbeat::{HeartbeatSweeper, SweepReport};
