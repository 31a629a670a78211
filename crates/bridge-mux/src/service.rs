//! Multiplexer facade.
//!
//! Turns one raw duplex channel into:
//! - independent request/response exchanges addressed by correlation ID
//! - recurring lifecycle listeners addressed by fixed event name
//! - topic-based publish/subscribe with per-subscriber identity
//!
//! Outbound operations register first and send second, so a result can
//! never arrive for an ID the registries do not know yet. Inbound messages
//! go through [`Multiplexer::deliver`], one at a time in arrival order.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::callback::Callback;
use crate::domain::config::MuxConfig;
use crate::domain::correlation::{IdGenerator, RequestId, SubscriptionId};
use crate::domain::listeners::{LifecycleEvent, ListenerRegistry};
use crate::domain::pending::{expiry_sweeper, PendingRequestStore, Settlement};
use crate::domain::subscriptions::SubscriptionRegistry;
use crate::domain::topic::{derive_topic, Topic};
use crate::error::{MuxError, RemoteError};
use crate::ipc::{Envelope, InboundMessage};
use crate::metrics::{MetricsSnapshot, MuxMetrics};
use crate::ports::Transport;

/// Future of an issued call. Resolves exactly once.
///
/// Dropping it does not cancel the request; the pending entry stays until
/// the result (or the expiry sweeper) removes it.
#[must_use = "a pending call does nothing unless awaited"]
#[derive(Debug)]
pub struct PendingCall {
    request_id: RequestId,
    receiver: oneshot::Receiver<Settlement>,
}

impl PendingCall {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

impl Future for PendingCall {
    type Output = Result<Value, MuxError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement),
            Poll::Ready(Err(_)) => Poll::Ready(Err(MuxError::Closed {
                request_id: self.request_id.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Future of a subscription request, tagged with the subscription ID.
///
/// The subscriber is live as soon as this is returned; awaiting it only
/// yields the remote side's acknowledgement.
#[must_use = "the subscription ID is needed to unsubscribe"]
#[derive(Debug)]
pub struct SubscriptionCall {
    id: SubscriptionId,
    topic: Topic,
    response: PendingCall,
}

impl SubscriptionCall {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Split into the subscription ID and the acknowledgement future.
    pub fn into_parts(self) -> (SubscriptionId, PendingCall) {
        (self.id, self.response)
    }
}

impl Future for SubscriptionCall {
    type Output = Result<Value, MuxError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.response).poll(cx)
    }
}

/// Where an inbound message went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A pending request was settled.
    Settled,
    /// Lifecycle listeners invoked (count of listeners that ran cleanly).
    Dispatched(usize),
    /// Subscribers invoked (count of subscribers that ran cleanly).
    Published(usize),
    /// Nothing registered under the identifier; dropped.
    Unroutable,
    /// Frame could not be decoded; dropped.
    Malformed,
}

/// The multiplexer facade.
pub struct Multiplexer {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingRequestStore>,
    listeners: ListenerRegistry,
    subscriptions: SubscriptionRegistry,
    metrics: Arc<MuxMetrics>,
    config: MuxConfig,
}

impl Multiplexer {
    /// Create a multiplexer with the generator named by `config`.
    pub fn new(config: MuxConfig, transport: Arc<dyn Transport>) -> Self {
        let generator = config.id_strategy.build();
        Self::with_generator(config, transport, generator)
    }

    /// Create a multiplexer with an explicit identifier generator.
    pub fn with_generator(
        config: MuxConfig,
        transport: Arc<dyn Transport>,
        generator: Arc<dyn IdGenerator>,
    ) -> Self {
        let metrics = Arc::new(MuxMetrics::new());
        Self {
            transport,
            pending: Arc::new(PendingRequestStore::new(
                generator.clone(),
                config.request_timeout(),
                metrics.clone(),
            )),
            listeners: ListenerRegistry::new(generator.clone(), metrics.clone()),
            subscriptions: SubscriptionRegistry::new(generator, metrics.clone()),
            metrics,
            config,
        }
    }

    /// Spawn the expiry sweeper if a request timeout is configured.
    ///
    /// Must be called from within a Tokio runtime. The task stops by itself
    /// when the multiplexer is dropped.
    pub fn start_expiry_sweeper(&self) -> Option<JoinHandle<()>> {
        self.config.request_timeout()?;
        Some(tokio::spawn(expiry_sweeper(
            Arc::downgrade(&self.pending),
            self.config.sweep_interval(),
        )))
    }

    // ── Request / response ──────────────────────────────────────────────────

    /// Register a pending request and send its `call` envelope.
    ///
    /// Returns once the envelope is handed to the transport; the returned
    /// future resolves when the result arrives.
    pub async fn request(&self, method: &str, data: Value) -> Result<PendingCall, MuxError> {
        let (request_id, receiver) = self.pending.register(method, None);

        let envelope = Envelope::call(request_id.clone(), method, data);
        if let Err(e) = self.transport.send(envelope).await {
            self.pending.cancel(request_id.as_str());
            warn!(request_id = %request_id, method = method, error = %e, "Failed to send call");
            return Err(e.into());
        }

        debug!(request_id = %request_id, method = method, "Sent call");
        Ok(PendingCall {
            request_id,
            receiver,
        })
    }

    /// Call `method` on the remote side and wait for its result.
    ///
    /// Rejects with [`MuxError::Remote`] when the remote reports an error.
    pub async fn call(&self, method: &str, data: Value) -> Result<Value, MuxError> {
        self.request(method, data).await?.await
    }

    // ── Publish / subscribe ─────────────────────────────────────────────────

    /// Subscribe `callback` to the topic derived from `subject`, and ask the
    /// remote side to start publishing it.
    ///
    /// If the request cannot be sent the subscriber is removed again.
    pub async fn subscribe<F>(
        &self,
        subject: &str,
        data: Value,
        callback: F,
    ) -> Result<SubscriptionCall, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let topic = derive_topic(subject);
        debug!(subject = subject, topic = %topic, "Subscribing");

        let callback: Callback = Arc::new(callback);
        let id = self.subscriptions.subscribe(topic.clone(), callback);

        match self.request(subject, data).await {
            Ok(response) => Ok(SubscriptionCall {
                id,
                topic,
                response,
            }),
            Err(e) => {
                self.subscriptions.unsubscribe(&topic, Some(id.as_str()));
                Err(e)
            }
        }
    }

    /// Remove one subscriber (`Some(id)`) or every subscriber (`None`) of the
    /// topic derived from `subject`. Returns the number removed.
    ///
    /// Local only: the remote side is not told.
    pub fn unsubscribe(&self, subject: &str, id: Option<&str>) -> usize {
        let topic = derive_topic(subject);
        self.subscriptions.unsubscribe(&topic, id)
    }

    // ── Lifecycle listeners ─────────────────────────────────────────────────

    pub async fn on_connect<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_lifecycle(LifecycleEvent::Connect, callback).await
    }

    pub async fn on_disconnect<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_lifecycle(LifecycleEvent::Disconnect, callback).await
    }

    pub async fn on_connect_failure<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_lifecycle(LifecycleEvent::ConnectFailure, callback).await
    }

    pub async fn on_error<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_lifecycle(LifecycleEvent::Error, callback).await
    }

    /// Register a recurring listener for `event` and announce it to the
    /// remote side. The listener is removed again if the announcement
    /// cannot be sent.
    pub async fn on_lifecycle<F>(
        &self,
        event: LifecycleEvent,
        callback: F,
    ) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.listeners.add(event, Arc::new(callback));

        if let Err(e) = self
            .transport
            .send(Envelope::lifecycle(event, id.clone()))
            .await
        {
            self.listeners.remove(id.as_str());
            warn!(listener_id = %id, event = %event, error = %e, "Failed to announce listener");
            return Err(e.into());
        }
        Ok(id)
    }

    /// Remove a lifecycle listener locally.
    pub fn remove_listener(&self, id: &str) -> bool {
        self.listeners.remove(id)
    }

    /// Ask the remote side to disconnect.
    pub async fn disconnect(&self) -> Result<(), MuxError> {
        self.transport.send(Envelope::disconnect()).await?;
        debug!("Sent disconnect");
        Ok(())
    }

    // ── Inbound routing ─────────────────────────────────────────────────────

    /// Route one inbound message to the matching registry.
    ///
    /// Never fails: unknown identifiers and topics are dropped.
    pub fn deliver(&self, message: InboundMessage) -> Delivery {
        match message {
            InboundMessage::Direct { id, result } => self.deliver_direct(id, result),
            InboundMessage::Result { id, result, error } => {
                let outcome = match RemoteError::from_wire(error) {
                    Some(error) => Err(error),
                    None => Ok(result),
                };
                if self.pending.settle(id.as_str(), outcome) {
                    Delivery::Settled
                } else {
                    Delivery::Unroutable
                }
            }
            InboundMessage::Publish { subject, result } => {
                let topic = derive_topic(&subject);
                debug!(subject = %subject, topic = %topic, "Routing publish");
                Delivery::Published(self.subscriptions.publish(&topic, &result))
            }
        }
    }

    /// Listener IDs and request IDs share one space. A success reply whose
    /// `error` key was dropped on the wire arrives here without a listener
    /// and still settles its pending request.
    fn deliver_direct(&self, id: RequestId, result: Value) -> Delivery {
        if let Some(event) = self.listeners.event_for(id.as_str()) {
            return Delivery::Dispatched(self.listeners.dispatch(event, &result));
        }

        if let Some(method) = self.pending.method_of(id.as_str()) {
            debug!(request_id = %id, method = %method, "Direct delivery settles pending request");
            return if self.pending.settle(id.as_str(), Ok(result)) {
                Delivery::Settled
            } else {
                Delivery::Unroutable
            };
        }

        // Same policy as unknown result IDs in the pending store.
        MuxMetrics::incr(&self.metrics.unknown_correlations);
        warn!(listener_id = %id, "Direct delivery for unknown listener ID");
        Delivery::Unroutable
    }

    /// Decode and route a raw inbound frame. Unrecognisable frames are
    /// dropped.
    pub fn deliver_json(&self, frame: &Value) -> Delivery {
        match InboundMessage::from_json(frame) {
            Ok(message) => self.deliver(message),
            Err(e) => {
                MuxMetrics::incr(&self.metrics.malformed_inbound);
                warn!(error = %e, "Dropping inbound frame");
                Delivery::Malformed
            }
        }
    }

    // ── Introspection ───────────────────────────────────────────────────────

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.is_pending(request_id)
    }

    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.subscriptions.subscriber_count(&derive_topic(subject))
    }

    pub fn listener_count(&self, event: LifecycleEvent) -> usize {
        self.listeners.listener_count(event)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }
}
