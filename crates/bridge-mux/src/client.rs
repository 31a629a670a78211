//! Typed node client.
//!
//! Names the node operations a host actually uses. Payloads are built here;
//! results stay opaque JSON.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::correlation::RequestId;
use crate::error::MuxError;
use crate::service::{Multiplexer, SubscriptionCall};

pub const GET_BLOCK: &str = "getBlockRequest";
pub const GET_TRANSACTIONS_BY_ADDRESSES: &str = "getTransactionsByAddressesRequest";
pub const GET_UTXOS_BY_ADDRESSES: &str = "getUtxosByAddressesRequest";
pub const SUBMIT_TRANSACTION: &str = "submitTransactionRequest";
pub const GET_VIRTUAL_SELECTED_PARENT_BLUE_SCORE: &str = "getVirtualSelectedParentBlueScoreRequest";

pub const NOTIFY_CHAIN_CHANGED: &str = "notifyChainChangedRequest";
pub const NOTIFY_BLOCK_ADDED: &str = "notifyBlockAddedRequest";
pub const NOTIFY_VIRTUAL_SELECTED_PARENT_BLUE_SCORE_CHANGED: &str =
    "notifyVirtualSelectedParentBlueScoreChangedRequest";
pub const NOTIFY_UTXOS_CHANGED: &str = "notifyUtxosChangedRequest";

/// Node RPC client over a shared [`Multiplexer`].
#[derive(Clone)]
pub struct NodeRpc {
    mux: Arc<Multiplexer>,
}

impl NodeRpc {
    pub fn new(mux: Arc<Multiplexer>) -> Self {
        Self { mux }
    }

    pub fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.mux
    }

    /// Generic request; resolves with the remote result.
    pub async fn request(&self, method: &str, data: Value) -> Result<Value, MuxError> {
        self.mux.call(method, data).await
    }

    pub async fn get_block(&self, hash: &str) -> Result<Value, MuxError> {
        self.request(
            GET_BLOCK,
            json!({ "hash": hash, "includeBlockVerboseData": true }),
        )
        .await
    }

    pub async fn get_transactions_by_addresses(
        &self,
        starting_block_hash: &str,
        addresses: &[String],
    ) -> Result<Value, MuxError> {
        self.request(
            GET_TRANSACTIONS_BY_ADDRESSES,
            json!({ "startingBlockHash": starting_block_hash, "addresses": addresses }),
        )
        .await
    }

    pub async fn get_utxos_by_addresses(&self, addresses: &[String]) -> Result<Value, MuxError> {
        self.request(GET_UTXOS_BY_ADDRESSES, json!({ "addresses": addresses })).await
    }

    /// Submit a transaction; `tx` is forwarded unchanged.
    pub async fn submit_transaction(&self, tx: Value) -> Result<Value, MuxError> {
        self.request(SUBMIT_TRANSACTION, tx).await
    }

    pub async fn get_virtual_selected_parent_blue_score(&self) -> Result<Value, MuxError> {
        self.request(GET_VIRTUAL_SELECTED_PARENT_BLUE_SCORE, json!({})).await
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    pub async fn subscribe<F>(
        &self,
        subject: &str,
        data: Value,
        callback: F,
    ) -> Result<SubscriptionCall, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.mux.subscribe(subject, data, callback).await
    }

    pub fn unsubscribe(&self, subject: &str, id: Option<&str>) -> usize {
        self.mux.unsubscribe(subject, id)
    }

    pub async fn subscribe_chain_changed<F>(
        &self,
        callback: F,
    ) -> Result<SubscriptionCall, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(NOTIFY_CHAIN_CHANGED, json!({}), callback).await
    }

    pub async fn subscribe_block_added<F>(&self, callback: F) -> Result<SubscriptionCall, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(NOTIFY_BLOCK_ADDED, json!({}), callback).await
    }

    pub async fn subscribe_virtual_selected_parent_blue_score_changed<F>(
        &self,
        callback: F,
    ) -> Result<SubscriptionCall, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(
            NOTIFY_VIRTUAL_SELECTED_PARENT_BLUE_SCORE_CHANGED,
            json!({}),
            callback,
        )
        .await
    }

    pub async fn subscribe_utxos_changed<F>(
        &self,
        addresses: &[String],
        callback: F,
    ) -> Result<SubscriptionCall, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(
            NOTIFY_UTXOS_CHANGED,
            json!({ "addresses": addresses }),
            callback,
        )
        .await
    }

    /// Drop one UTXO subscriber, or all of them with `None`.
    pub fn unsubscribe_utxos_changed(&self, id: Option<&str>) -> usize {
        self.unsubscribe(NOTIFY_UTXOS_CHANGED, id)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    pub async fn on_connect<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.mux.on_connect(callback).await
    }

    pub async fn on_disconnect<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.mux.on_disconnect(callback).await
    }

    pub async fn on_connect_failure<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.mux.on_connect_failure(callback).await
    }

    pub async fn on_error<F>(&self, callback: F) -> Result<RequestId, MuxError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.mux.on_error(callback).await
    }

    pub async fn disconnect(&self) -> Result<(), MuxError> {
        self.mux.disconnect().await
    }
}
