//! Adapters for the channel ports.

pub mod channel;
pub mod pump;

pub use channel::{pair, ChannelInbound, ChannelTransport, RemoteEnd};
pub use pump::InboundPump;
