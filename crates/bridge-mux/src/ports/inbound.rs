//! Inbound port: messages arriving from the remote dispatcher.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::ipc::InboundMessage;

/// Source of inbound messages, in arrival order.
#[async_trait]
pub trait InboundSource: Send + Sync {
    /// Receive the next message (waits until one is available).
    ///
    /// Returns `TransportError::ChannelClosed` once no more messages can
    /// arrive.
    async fn receive(&self) -> Result<InboundMessage, TransportError>;
}
