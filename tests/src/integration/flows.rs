//! # Integration Test Flows
//!
//! End-to-end behaviour of the multiplexer over a live channel:
//!
//! 1. **Calls**: results resolve, remote errors reject, late duplicates are dropped
//! 2. **Lifecycle**: one direct delivery reaches every listener of its event
//! 3. **Pub/sub**: per-subscriber removal, whole-topic removal, subject/topic routing
//! 4. **Hardening**: malformed frames, expiry of unanswered calls
//!
//! Ordering barrier: the inbound pump delivers strictly in arrival order, so
//! once a `ping` call issued after a publish has resolved, the publish has
//! already been dispatched.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bridge_mux::adapters::channel::{self, RemoteEnd};
    use bridge_mux::{
        derive_topic, Delivery, InboundMessage, InboundPump, LifecycleEvent, Multiplexer,
        MuxConfig, MuxError, RemoteError,
    };
    use bridge_runtime::{BridgeSession, LoopbackRemote};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const WAIT: Duration = Duration::from_secs(2);

    fn loopback() -> LoopbackRemote {
        LoopbackRemote::node_defaults().with_method("ping", |_| Ok(json!("pong")))
    }

    fn session() -> BridgeSession {
        BridgeSession::start(MuxConfig::default(), loopback())
    }

    /// Resolves once every inbound message queued before it has been routed.
    async fn barrier(session: &BridgeSession) {
        let pong = timeout(WAIT, session.rpc().request("ping", json!({})))
            .await
            .expect("barrier timed out")
            .expect("barrier call failed");
        assert_eq!(pong, json!("pong"));
    }

    /// Multiplexer with a hand-driven remote end and a running pump.
    fn manual(config: MuxConfig) -> (Arc<Multiplexer>, RemoteEnd, JoinHandle<u64>) {
        let (transport, inbound, remote) = channel::pair(64);
        let mux = Arc::new(Multiplexer::new(config, Arc::new(transport)));
        let pump = tokio::spawn(InboundPump::new(mux.clone(), Arc::new(inbound)).run());
        (mux, remote, pump)
    }

    // =============================================================================
    // CALLS
    // =============================================================================

    #[tokio::test]
    async fn test_get_block_resolves_with_result() {
        let session = session();

        let block = timeout(WAIT, session.rpc().get_block("abc"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(block, json!({"block": {"verboseData": {"hash": "abc"}}}));
        assert_eq!(session.mux().pending_count(), 0);

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_error_rejects_call() {
        let remote =
            LoopbackRemote::new().with_method("getBlockRequest", |_| Err(json!("not found")));
        let session = BridgeSession::start(MuxConfig::default(), remote);

        let err = timeout(WAIT, session.rpc().get_block("abc"))
            .await
            .unwrap()
            .unwrap_err();
        match err {
            MuxError::Remote(remote) => assert_eq!(remote.message(), Some("not found")),
            other => panic!("expected remote error, got {other:?}"),
        }

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_falsy_error_field_resolves() {
        let (mux, mut remote, _pump) = manual(MuxConfig::default());

        let pending = mux.request("getBlockRequest", json!({})).await.unwrap();
        let id = remote.envelopes.recv().await.unwrap().id.unwrap();
        remote
            .reply(InboundMessage::result(id, json!({"ok": 1}), json!("")))
            .await
            .unwrap();

        assert_eq!(timeout(WAIT, pending).await.unwrap().unwrap(), json!({"ok": 1}));
    }

    #[tokio::test]
    async fn test_duplicate_result_settles_once() {
        let (mux, mut remote, pump) = manual(MuxConfig::default());

        let pending = mux.request("getBlockRequest", json!({"hash": "abc"})).await.unwrap();
        let id = remote.envelopes.recv().await.unwrap().id.unwrap();

        remote
            .reply(InboundMessage::result(id.clone(), json!("first"), Value::Null))
            .await
            .unwrap();
        remote
            .reply(InboundMessage::result(id, Value::Null, json!("second")))
            .await
            .unwrap();
        drop(remote);

        assert_eq!(timeout(WAIT, pending).await.unwrap().unwrap(), json!("first"));
        assert_eq!(pump.await.unwrap(), 2);

        let metrics = mux.metrics();
        assert_eq!(metrics.requests_settled, 1);
        assert_eq!(metrics.requests_rejected, 0);
        assert_eq!(metrics.unknown_correlations, 1);
    }

    #[tokio::test]
    async fn test_result_for_foreign_id_is_ignored() {
        let session = session();
        session
            .remote()
            .emit(InboundMessage::result("never-issued", json!(1), Value::Null))
            .await
            .unwrap();
        barrier(&session).await;

        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.metrics.unknown_correlations, 1);
        assert_eq!(summary.metrics.requests_settled, 1);
    }

    // =============================================================================
    // LIFECYCLE LISTENERS
    // =============================================================================

    #[tokio::test]
    async fn test_direct_delivery_reaches_all_listeners_in_order() {
        let (mux, mut remote, _pump) = manual(MuxConfig::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        let first_log = log.clone();
        let first = mux
            .on_connect(move |_| first_log.lock().push("first"))
            .await
            .unwrap();
        let second_log = log.clone();
        mux.on_connect(move |_| {
            second_log.lock().push("second");
            let _ = done_tx.send(());
        })
        .await
        .unwrap();

        assert_eq!(remote.envelopes.recv().await.unwrap().op, "onConnect");
        assert_eq!(remote.envelopes.recv().await.unwrap().op, "onConnect");

        remote
            .reply(InboundMessage::direct(first, json!({})))
            .await
            .unwrap();
        timeout(WAIT, done_rx.recv()).await.unwrap().unwrap();

        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_loopback_acknowledges_connect_listener() {
        let session = session();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        session
            .rpc()
            .on_connect(move |payload: &Value| {
                let _ = tx.send(payload.clone());
            })
            .await
            .unwrap();

        assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(json!({})));
        assert_eq!(session.mux().listener_count(LifecycleEvent::Connect), 1);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_error_listener_is_recurring() {
        let (mux, mut remote, _pump) = manual(MuxConfig::default());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let id = mux
            .on_error(move |error: &Value| {
                let _ = tx.send(error.clone());
            })
            .await
            .unwrap();
        let _ = remote.envelopes.recv().await;

        for n in 0..3 {
            remote
                .reply(InboundMessage::direct(id.clone(), json!({ "n": n })))
                .await
                .unwrap();
        }
        for n in 0..3 {
            assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(json!({ "n": n })));
        }
    }

    // =============================================================================
    // PUBLISH / SUBSCRIBE
    // =============================================================================

    #[tokio::test]
    async fn test_unsubscribe_by_id_leaves_other_subscriber() {
        let session = session();
        let first_hits = Arc::new(AtomicUsize::new(0));
        let second_hits = Arc::new(AtomicUsize::new(0));

        let counter = first_hits.clone();
        let first = session
            .rpc()
            .subscribe_utxos_changed(&["x".to_string()], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        let counter = second_hits.clone();
        let second = session
            .rpc()
            .subscribe_utxos_changed(&["y".to_string()], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_ne!(first.id(), second.id());

        let (first_id, first_ack) = first.into_parts();
        assert_eq!(timeout(WAIT, first_ack).await.unwrap().unwrap(), json!({}));

        assert_eq!(
            session
                .rpc()
                .unsubscribe("notifyUtxosChangedRequest", Some(first_id.as_str())),
            1
        );

        session
            .remote()
            .publish("utxosChangedNotification", json!({"added": []}))
            .await
            .unwrap();
        barrier(&session).await;

        assert_eq!(first_hits.load(Ordering::SeqCst), 0);
        assert_eq!(second_hits.load(Ordering::SeqCst), 1);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_all_makes_publish_a_noop() {
        let session = session();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = hits.clone();
            let _ = session
                .rpc()
                .subscribe_block_added(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }
        assert_eq!(session.rpc().unsubscribe("notifyBlockAddedRequest", None), 3);

        session
            .remote()
            .publish("blockAddedNotification", json!({}))
            .await
            .unwrap();
        barrier(&session).await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(session.mux().metrics().publishes_delivered, 0);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_by_subject_or_topic_reaches_same_subscribers() {
        let session = session();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _ = session
            .rpc()
            .subscribe_chain_changed(move |v: &Value| sink.lock().push(v.clone()))
            .await
            .unwrap();

        assert_eq!(
            derive_topic("notifyChainChangedRequest").as_str(),
            "chainChangedNotification"
        );
        session
            .remote()
            .publish("chainChangedNotification", json!(1))
            .await
            .unwrap();
        session
            .remote()
            .publish("notifyChainChangedRequest", json!(2))
            .await
            .unwrap();
        barrier(&session).await;

        assert_eq!(*seen.lock(), vec![json!(1), json!(2)]);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_subscriber_does_not_block_others() {
        let session = session();
        let hits = Arc::new(AtomicUsize::new(0));

        let _ = session
            .rpc()
            .subscribe_block_added(|_| panic!("subscriber bug"))
            .await
            .unwrap();
        let counter = hits.clone();
        let _ = session
            .rpc()
            .subscribe_block_added(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        session
            .remote()
            .publish("blockAddedNotification", json!({}))
            .await
            .unwrap();
        barrier(&session).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let summary = session.shutdown().await.unwrap();
        assert_eq!(summary.metrics.callback_failures, 1);
    }

    // =============================================================================
    // HARDENING
    // =============================================================================

    #[tokio::test]
    async fn test_malformed_frames_do_not_disturb_routing() {
        let (mux, mut remote, _pump) = manual(MuxConfig::default());

        let pending = mux.request("getBlockRequest", json!({})).await.unwrap();
        let id = remote.envelopes.recv().await.unwrap().id.unwrap();

        assert_eq!(mux.deliver_json(&json!(42)), Delivery::Malformed);
        assert_eq!(mux.deliver_json(&json!({"result": {}})), Delivery::Malformed);
        assert_eq!(
            mux.deliver_json(&json!({"op": "rpc-result", "rid": id, "result": "ok", "error": null})),
            Delivery::Settled
        );

        assert_eq!(timeout(WAIT, pending).await.unwrap().unwrap(), json!("ok"));
        assert_eq!(mux.metrics().malformed_inbound, 2);
    }

    #[tokio::test]
    async fn test_unanswered_call_expires() {
        let config = MuxConfig {
            sweep_interval_ms: 10,
            ..MuxConfig::default()
        }
        .with_request_timeout(Duration::from_millis(30));
        let (mux, mut remote, _pump) = manual(config);
        let _sweeper = mux.start_expiry_sweeper().expect("timeout is configured");

        let pending = mux.request("getBlockRequest", json!({})).await.unwrap();
        let id = remote.envelopes.recv().await.unwrap().id.unwrap();

        let err = timeout(WAIT, pending).await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            MuxError::Expired { ref method, .. } if method == "getBlockRequest"
        ));

        // A result arriving after expiry has nothing to settle.
        assert_eq!(
            mux.deliver(InboundMessage::result(id, json!(1), Value::Null)),
            Delivery::Unroutable
        );
    }

    #[tokio::test]
    async fn test_remote_error_value_is_carried_opaquely() {
        let (mux, mut remote, _pump) = manual(MuxConfig::default());

        let pending = mux.request("submitTransactionRequest", json!({})).await.unwrap();
        let id = remote.envelopes.recv().await.unwrap().id.unwrap();
        let error = json!({"code": -32000, "message": "mass too high"});
        remote
            .reply(InboundMessage::result(id, Value::Null, error.clone()))
            .await
            .unwrap();

        assert_eq!(
            timeout(WAIT, pending).await.unwrap().unwrap_err(),
            MuxError::Remote(RemoteError::new(error))
        );
    }
}
