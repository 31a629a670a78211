//! Wire messages exchanged with the remote dispatcher.
//!
//! The core never looks inside `args`, `result` or `error`; it only routes
//! on `op`, `id` and `subject`.

pub mod envelope;
pub mod inbound;

pub use envelope::{Envelope, CALL_OP, DISCONNECT_OP};
pub use inbound::InboundMessage;
