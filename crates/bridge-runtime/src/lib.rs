//! # Bridge Runtime
//!
//! Wires a [`Multiplexer`] to an in-process [`LoopbackRemote`] and runs the
//! background tasks a session needs.
//!
//! ## Startup Sequence
//!
//! 1. Create the in-memory channel pair
//! 2. Build the multiplexer on the outbound half
//! 3. Spawn the loopback dispatcher on the remote half
//! 4. Spawn the inbound pump (and the expiry sweeper when a timeout is set)
//!
//! ```text
//!  NodeRpc ──► Multiplexer ──Envelope──► LoopbackRemote
//!                   ▲                         │
//!                   └── InboundPump ◄─────────┘
//! ```

pub mod loopback;

use std::sync::Arc;

use bridge_mux::adapters::channel;
use bridge_mux::{InboundPump, MetricsSnapshot, Multiplexer, MuxConfig, MuxError, NodeRpc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use loopback::{LoopbackHandle, LoopbackRemote, MethodHandler};

/// A running multiplexer session against a loopback dispatcher.
pub struct BridgeSession {
    rpc: NodeRpc,
    remote: LoopbackHandle,
    remote_task: JoinHandle<u64>,
    pump: JoinHandle<u64>,
    sweeper: Option<JoinHandle<()>>,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Envelopes handled by the dispatcher
    pub envelopes_served: u64,
    /// Inbound messages routed by the pump
    pub messages_delivered: u64,
    pub metrics: MetricsSnapshot,
}

impl BridgeSession {
    /// Start a session. Must be called from within a Tokio runtime.
    pub fn start(config: MuxConfig, remote: LoopbackRemote) -> Self {
        let (transport, inbound, remote_end) = channel::pair(config.channel_capacity);

        let mux = Arc::new(Multiplexer::new(config, Arc::new(transport)));
        let sweeper = mux.start_expiry_sweeper();
        let (remote, remote_task) = remote.spawn(remote_end);
        let pump = tokio::spawn(InboundPump::new(mux.clone(), Arc::new(inbound)).run());

        info!(
            id_strategy = ?mux.config().id_strategy,
            request_timeout_ms = ?mux.config().request_timeout_ms,
            "Bridge session started"
        );

        Self {
            rpc: NodeRpc::new(mux),
            remote,
            remote_task,
            pump,
            sweeper,
        }
    }

    pub fn rpc(&self) -> &NodeRpc {
        &self.rpc
    }

    pub fn mux(&self) -> &Arc<Multiplexer> {
        self.rpc.multiplexer()
    }

    /// Handle for injecting notifications from the remote side.
    pub fn remote(&self) -> &LoopbackHandle {
        &self.remote
    }

    /// Send `disconnect`, wait for the dispatcher and the pump to drain, and
    /// report what the session did.
    pub async fn shutdown(self) -> Result<SessionSummary, MuxError> {
        let Self {
            rpc,
            remote,
            remote_task,
            pump,
            sweeper,
        } = self;

        rpc.disconnect().await?;

        let envelopes_served = remote_task.await.unwrap_or_else(|e| {
            warn!(error = %e, "Loopback task failed");
            0
        });
        // The pump stops once every sender of the inbound queue is gone.
        drop(remote);
        let messages_delivered = pump.await.unwrap_or_else(|e| {
            warn!(error = %e, "Inbound pump failed");
            0
        });
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        let summary = SessionSummary {
            envelopes_served,
            messages_delivered,
            metrics: rpc.multiplexer().metrics(),
        };
        info!(
            envelopes = summary.envelopes_served,
            delivered = summary.messages_delivered,
            in_flight = summary.metrics.in_flight(),
            "Bridge session closed"
        );
        Ok(summary)
    }
}
