//! Sending library commands: one-off, in a batch, or on a timer.
//!
//! Built on [`ControllerHandle`](crate::ControllerHandle). Failed sends are
//! counted and reported but never retried.

mod repeat;
pub mod tasks;

pub use repeat::RepeatSchedule;
pub use tasks::{send_batch, send_command, BatchReport};
