//! In-process stand-in for the remote dispatcher.
//!
//! Serves `call` envelopes from a method table, acknowledges lifecycle
//! registrations, and lets the host inject notifications through a
//! [`LoopbackHandle`].

use std::collections::HashMap;
use std::sync::Arc;

use bridge_mux::{Envelope, InboundMessage, LifecycleEvent, RemoteEnd, RequestId, TransportError};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A served method: payload in, result or error value out.
pub type MethodHandler = Arc<dyn Fn(&Value) -> Result<Value, Value> + Send + Sync>;

/// Loopback dispatcher configuration.
#[derive(Clone, Default)]
pub struct LoopbackRemote {
    methods: HashMap<String, MethodHandler>,
}

impl LoopbackRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `method` with `handler`.
    pub fn with_method<F>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.methods.insert(method.to_string(), Arc::new(handler));
        self
    }

    /// Canned answers for the node operations used by the demo session.
    pub fn node_defaults() -> Self {
        Self::new()
            .with_method("getBlockRequest", |data| {
                let hash = data.get("hash").cloned().unwrap_or(Value::Null);
                Ok(json!({ "block": { "verboseData": { "hash": hash } } }))
            })
            .with_method("getVirtualSelectedParentBlueScoreRequest", |_| {
                Ok(json!({ "blueScore": "1024" }))
            })
            .with_method("getUtxosByAddressesRequest", |_| Ok(json!({ "entries": [] })))
            .with_method("getTransactionsByAddressesRequest", |data| {
                Ok(json!({
                    "transactions": [],
                    "lastBlockScanned": data.get("startingBlockHash").cloned().unwrap_or(Value::Null),
                }))
            })
            .with_method("submitTransactionRequest", |data| match data.get("transaction") {
                Some(_) => Ok(json!({ "transactionId": "loopback-tx" })),
                None => Err(json!("missing transaction")),
            })
    }

    /// Start serving the remote end of a channel.
    ///
    /// The task ends after a `disconnect` envelope or when the multiplexer
    /// side is dropped, and returns the number of envelopes handled.
    pub fn spawn(self, end: RemoteEnd) -> (LoopbackHandle, JoinHandle<u64>) {
        let RemoteEnd { envelopes, inbound } = end;
        let handle = LoopbackHandle {
            inbound: inbound.clone(),
        };
        let task = tokio::spawn(
            LoopbackTask {
                methods: self.methods,
                inbound,
                listeners: HashMap::new(),
            }
            .run(envelopes),
        );
        (handle, task)
    }
}

/// Injects inbound messages as if the remote side had sent them.
#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    inbound: mpsc::Sender<InboundMessage>,
}

impl LoopbackHandle {
    /// Publish a notification under `subject` (a request subject or a topic).
    pub async fn publish(&self, subject: &str, result: Value) -> Result<(), TransportError> {
        self.emit(InboundMessage::publish(subject, result)).await
    }

    pub async fn emit(&self, message: InboundMessage) -> Result<(), TransportError> {
        self.inbound
            .send(message)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

struct LoopbackTask {
    methods: HashMap<String, MethodHandler>,
    inbound: mpsc::Sender<InboundMessage>,
    listeners: HashMap<LifecycleEvent, Vec<RequestId>>,
}

impl LoopbackTask {
    async fn run(mut self, mut envelopes: mpsc::Receiver<Envelope>) -> u64 {
        let mut handled = 0u64;
        while let Some(envelope) = envelopes.recv().await {
            handled += 1;
            match self.handle(envelope).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "Loopback reply channel closed");
                    break;
                }
            }
        }
        info!(handled = handled, "Loopback dispatcher stopped");
        handled
    }

    /// Returns `Ok(false)` once the session should end.
    async fn handle(&mut self, envelope: Envelope) -> Result<bool, TransportError> {
        if let Some(method) = envelope.call_method() {
            let Some(id) = envelope.id.clone() else {
                warn!(method = method, "Call without an identifier");
                return Ok(true);
            };
            let data = envelope.call_data().cloned().unwrap_or(Value::Null);
            let reply = match self.answer(method, &data) {
                Ok(result) => InboundMessage::result(id, result, Value::Null),
                Err(error) => InboundMessage::result(id, Value::Null, error),
            };
            self.send(reply).await?;
            return Ok(true);
        }

        if let Some(event) = envelope.lifecycle_event() {
            let Some(id) = envelope.id else {
                warn!(event = %event, "Listener registration without an identifier");
                return Ok(true);
            };
            debug!(event = %event, listener_id = %id, "Listener registered");
            if event == LifecycleEvent::Connect {
                // Already connected: acknowledge right away.
                self.send(InboundMessage::direct(id.clone(), json!({}))).await?;
            }
            self.listeners.entry(event).or_default().push(id);
            return Ok(true);
        }

        if envelope.op == bridge_mux::ipc::DISCONNECT_OP {
            let ids = self
                .listeners
                .remove(&LifecycleEvent::Disconnect)
                .unwrap_or_default();
            for id in ids {
                self.send(InboundMessage::direct(id, json!({}))).await?;
            }
            return Ok(false);
        }

        warn!(op = %envelope.op, "Unsupported envelope");
        Ok(true)
    }

    fn answer(&self, method: &str, data: &Value) -> Result<Value, Value> {
        match self.methods.get(method) {
            Some(handler) => handler(data),
            // Subscription requests are acknowledged with an empty object.
            None if method.starts_with("notify") => Ok(json!({})),
            None => Err(json!(format!("unknown method: {method}"))),
        }
    }

    async fn send(&self, message: InboundMessage) -> Result<(), TransportError> {
        self.inbound
            .send(message)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}
