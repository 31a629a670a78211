//! # Bridge Runtime
//!
//! Runs one demo session: registers lifecycle listeners, subscribes to block
//! notifications, issues a few node calls against the loopback dispatcher
//! and shuts down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_mux::MuxConfig;
use bridge_runtime::{BridgeSession, LoopbackRemote};
use bridge_telemetry::{init_logging, TelemetryConfig};
use serde_json::{json, Value};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _logging = init_logging(&TelemetryConfig::from_env()).context("initializing logging")?;

    let config = MuxConfig::from_env().context("loading multiplexer configuration")?;
    let session = BridgeSession::start(config, LoopbackRemote::node_defaults());
    let rpc = session.rpc().clone();

    rpc.on_connect(|_| info!("Remote connected")).await?;
    rpc.on_disconnect(|_| info!("Remote disconnected")).await?;
    rpc.on_error(|error: &Value| warn!(error = %error, "Remote reported an error"))
        .await?;

    let blocks_seen = Arc::new(AtomicU64::new(0));
    let counter = blocks_seen.clone();
    let subscription = rpc
        .subscribe_block_added(move |notification: &Value| {
            counter.fetch_add(1, Ordering::Relaxed);
            info!(notification = %notification, "Block added");
        })
        .await?;
    let subscription_id = subscription.id().clone();
    subscription.await.context("block subscription rejected")?;

    let block = rpc.get_block("0000demo").await?;
    info!(block = %block, "Fetched block");

    let score = rpc.get_virtual_selected_parent_blue_score().await?;
    info!(score = %score, "Fetched blue score");

    for height in 1..=3 {
        session
            .remote()
            .publish("blockAddedNotification", json!({ "block": { "height": height } }))
            .await?;
    }

    if let Err(e) = rpc.submit_transaction(json!({})).await {
        warn!(error = %e, "Transaction rejected");
    }

    rpc.unsubscribe("notifyBlockAddedRequest", Some(subscription_id.as_str()));

    let summary = session.shutdown().await?;
    info!(
        blocks_seen = blocks_seen.load(Ordering::Relaxed),
        envelopes = summary.envelopes_served,
        delivered = summary.messages_delivered,
        settled = summary.metrics.requests_settled,
        rejected = summary.metrics.requests_rejected,
        "Demo session finished"
    );

    Ok(())
}
