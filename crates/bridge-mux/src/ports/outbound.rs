//! Outbound port: handing envelopes to the channel.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::TransportError;
use crate::ipc::Envelope;

/// Sends envelopes across the boundary.
///
/// Implementations must keep message boundaries and must not reorder
/// envelopes sent from the same task.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        (**self).send(envelope).await
    }
}
