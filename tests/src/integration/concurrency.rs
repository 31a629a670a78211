//! # Concurrency Tests
//!
//! Many calls in flight over one channel, answered in arbitrary order, and
//! fan-out while callbacks mutate the registries they are called from.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};
    use std::time::Duration;

    use async_trait::async_trait;
    use bridge_mux::adapters::channel;
    use bridge_mux::{
        Envelope, InboundMessage, InboundPump, Multiplexer, MuxConfig, Transport, TransportError,
    };
    use bridge_runtime::{BridgeSession, LoopbackRemote};
    use futures::future::join_all;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn echo_session() -> BridgeSession {
        let remote = LoopbackRemote::new().with_method("echo", |data| Ok(data.clone()));
        BridgeSession::start(MuxConfig::default(), remote)
    }

    /// Records envelopes without answering.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
            self.sent.lock().push(envelope);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_each_get_their_own_result() {
        let session = echo_session();
        let rpc = session.rpc().clone();

        let calls = (0..200).map(|n| {
            let rpc = rpc.clone();
            tokio::spawn(async move { rpc.request("echo", json!({ "n": n })).await })
        });
        let results = timeout(WAIT, join_all(calls)).await.unwrap();

        for (n, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().unwrap(), json!({ "n": n }));
        }
        assert_eq!(session.mux().pending_count(), 0);

        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.metrics.requests_settled, 200);
        assert_eq!(summary.metrics.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_results_delivered_in_reverse_order() {
        let transport = Arc::new(RecordingTransport::default());
        let mux = Multiplexer::new(MuxConfig::default(), transport.clone());

        let mut pending = Vec::new();
        for n in 0..20 {
            pending.push(mux.request("getBlockRequest", json!({ "n": n })).await.unwrap());
        }

        let sent: Vec<Envelope> = transport.sent.lock().drain(..).collect();
        assert_eq!(sent.len(), 20);
        for envelope in sent.into_iter().rev() {
            let data = envelope.call_data().cloned().unwrap_or(Value::Null);
            let id = envelope.id.unwrap();
            mux.deliver(InboundMessage::result(id, data, Value::Null));
        }

        for (n, call) in pending.into_iter().enumerate() {
            assert_eq!(call.await.unwrap(), json!({ "n": n }));
        }
    }

    #[tokio::test]
    async fn test_identifiers_unique_across_registries() {
        let transport = Arc::new(RecordingTransport::default());
        let mux = Multiplexer::new(MuxConfig::default(), transport.clone());

        for _ in 0..50 {
            let _ = mux.request("ping", json!({})).await.unwrap();
            mux.on_error(|_| {}).await.unwrap();
        }

        let mut ids: Vec<String> = transport
            .sent
            .lock()
            .iter()
            .filter_map(|e| e.id.as_ref().map(|id| id.as_str().to_string()))
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[tokio::test]
    async fn test_fan_out_to_many_subscribers() {
        let session = echo_session();
        let hits: Vec<Arc<AtomicUsize>> = (0..10).map(|_| Arc::new(AtomicUsize::new(0))).collect();

        for counter in &hits {
            let counter = counter.clone();
            let _ = session
                .rpc()
                .subscribe_block_added(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        for n in 0..50 {
            session
                .remote()
                .publish("blockAddedNotification", json!({ "n": n }))
                .await
                .unwrap();
        }
        // Ordered after every publish on the inbound queue.
        timeout(WAIT, session.rpc().request("echo", json!(null)))
            .await
            .unwrap()
            .unwrap();

        for counter in &hits {
            assert_eq!(counter.load(Ordering::SeqCst), 50);
        }
        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.metrics.publishes_delivered, 500);
    }

    #[tokio::test]
    async fn test_subscriber_can_unsubscribe_itself_during_publish() {
        let (transport, inbound, _remote) = channel::pair(16);
        let mux = Arc::new(Multiplexer::new(MuxConfig::default(), Arc::new(transport)));
        let _pump = tokio::spawn(InboundPump::new(mux.clone(), Arc::new(inbound)).run());

        let own_id: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let weak: Weak<Multiplexer> = Arc::downgrade(&mux);
        let id_slot = own_id.clone();
        let counter = hits.clone();
        let sub = mux
            .subscribe("notifyBlockAddedRequest", json!({}), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let (Some(mux), Some(id)) = (weak.upgrade(), id_slot.lock().clone()) {
                    mux.unsubscribe("notifyBlockAddedRequest", Some(&id));
                }
            })
            .await
            .unwrap();
        *own_id.lock() = Some(sub.id().as_str().to_string());

        mux.deliver(InboundMessage::publish("blockAddedNotification", json!(1)));
        mux.deliver(InboundMessage::publish("blockAddedNotification", json!(2)));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(mux.subscriber_count("notifyBlockAddedRequest"), 0);
    }

    #[tokio::test]
    async fn test_listener_registered_from_callback() {
        let transport = Arc::new(RecordingTransport::default());
        let mux = Arc::new(Multiplexer::new(MuxConfig::default(), transport.clone()));
        let spawned = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&mux);
        let counter = spawned.clone();
        let _ = mux
            .subscribe("notifyChainChangedRequest", json!({}), move |_| {
                if let Some(mux) = weak.upgrade() {
                    let counter = counter.clone();
                    // Registering from inside a callback must not deadlock.
                    tokio::spawn(async move {
                        let _ = mux.on_disconnect(|_| {}).await;
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
            .await
            .unwrap();

        mux.deliver(InboundMessage::publish("chainChangedNotification", json!({})));

        timeout(WAIT, async {
            while spawned.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            mux.listener_count(bridge_mux::LifecycleEvent::Disconnect),
            1
        );
    }
}
