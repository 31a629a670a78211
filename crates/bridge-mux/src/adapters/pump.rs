//! Inbound pump: drains an [`InboundSource`] into the multiplexer.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::TransportError;
use crate::ports::InboundSource;
use crate::service::{Delivery, Multiplexer};

/// Feeds inbound messages to [`Multiplexer::deliver`] one at a time, in
/// arrival order.
pub struct InboundPump {
    mux: Arc<Multiplexer>,
    source: Arc<dyn InboundSource>,
}

impl InboundPump {
    pub fn new(mux: Arc<Multiplexer>, source: Arc<dyn InboundSource>) -> Self {
        Self { mux, source }
    }

    /// Run until the source is closed. Returns the number of messages
    /// delivered.
    pub async fn run(self) -> u64 {
        let mut delivered = 0u64;
        loop {
            match self.source.receive().await {
                Ok(message) => {
                    let kind = message.kind();
                    let delivery = self.mux.deliver(message);
                    if delivery == Delivery::Unroutable {
                        debug!(kind = kind, "Inbound message had no recipient");
                    }
                    delivered += 1;
                }
                Err(TransportError::ChannelClosed) => {
                    warn!(delivered = delivered, "Inbound channel closed, stopping pump");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Error receiving inbound message");
                }
            }
        }
        delivered
    }
}
