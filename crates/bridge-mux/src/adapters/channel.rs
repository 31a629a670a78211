//! In-memory duplex channel built on Tokio mpsc queues.
//!
//! One half (`ChannelTransport` + `ChannelInbound`) is handed to the
//! multiplexer; the other (`RemoteEnd`) plays the remote dispatcher.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::TransportError;
use crate::ipc::{Envelope, InboundMessage};
use crate::ports::{InboundSource, Transport};

/// Outbound half: envelopes go to the remote end.
#[derive(Debug, Clone)]
pub struct ChannelTransport(pub mpsc::Sender<Envelope>);

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.0
            .send(envelope)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Inbound half: messages coming back from the remote end.
#[derive(Debug)]
pub struct ChannelInbound(Mutex<mpsc::Receiver<InboundMessage>>);

impl ChannelInbound {
    pub fn new(receiver: mpsc::Receiver<InboundMessage>) -> Self {
        Self(Mutex::new(receiver))
    }
}

#[async_trait]
impl InboundSource for ChannelInbound {
    async fn receive(&self) -> Result<InboundMessage, TransportError> {
        let mut guard = self.0.lock().await;
        guard.recv().await.ok_or(TransportError::ChannelClosed)
    }
}

/// The remote dispatcher's side of the channel.
#[derive(Debug)]
pub struct RemoteEnd {
    /// Envelopes sent by the multiplexer.
    pub envelopes: mpsc::Receiver<Envelope>,
    /// Messages to deliver back to the multiplexer.
    pub inbound: mpsc::Sender<InboundMessage>,
}

impl RemoteEnd {
    /// Queue one inbound message.
    pub async fn reply(&self, message: InboundMessage) -> Result<(), TransportError> {
        self.inbound
            .send(message)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Create a connected channel with `capacity` buffered messages per
/// direction.
pub fn pair(capacity: usize) -> (ChannelTransport, ChannelInbound, RemoteEnd) {
    let (envelope_tx, envelope_rx) = mpsc::channel(capacity);
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    (
        ChannelTransport(envelope_tx),
        ChannelInbound::new(inbound_rx),
        RemoteEnd {
            envelopes: envelope_rx,
            inbound: inbound_tx,
        },
    )
}
