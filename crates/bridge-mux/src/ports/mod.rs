//! Ports: the two edges of the channel the multiplexer depends on.

pub mod inbound;
pub mod outbound;

pub use inbound::InboundSource;
pub use outbound::Transport;
