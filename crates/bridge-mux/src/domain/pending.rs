//! Pending Request Store - the correlation registry.
//!
//! Maps correlation IDs to the one waiter of each in-flight request.
//!
//! Flow:
//! 1. Caller calls `register()` to get an ID and a oneshot receiver
//! 2. Caller sends the outbound envelope carrying that ID
//! 3. The inbound side calls `settle()` when the result arrives
//! 4. Caller awaits the receiver
//!
//! An entry is removed from the map *before* its waiter is notified, so a
//! request is settled at most once no matter how often its ID comes back.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::correlation::{IdGenerator, RequestId};
use crate::error::{MuxError, RemoteError};
use crate::metrics::MuxMetrics;

/// What a waiter receives.
pub type Settlement = Result<Value, MuxError>;

/// A request waiting for its result.
struct PendingRequest {
    sender: oneshot::Sender<Settlement>,
    created_at: Instant,
    method: String,
    timeout: Option<Duration>,
}

impl PendingRequest {
    fn is_expired(&self, now: Instant) -> bool {
        self.timeout
            .is_some_and(|timeout| now.duration_since(self.created_at) > timeout)
    }
}

/// Correlation registry: exactly one pending waiter per in-flight ID.
pub struct PendingRequestStore {
    pending: DashMap<RequestId, PendingRequest>,
    generator: Arc<dyn IdGenerator>,
    /// `None` keeps requests until they are settled.
    default_timeout: Option<Duration>,
    metrics: Arc<MuxMetrics>,
}

impl PendingRequestStore {
    pub fn new(
        generator: Arc<dyn IdGenerator>,
        default_timeout: Option<Duration>,
        metrics: Arc<MuxMetrics>,
    ) -> Self {
        Self {
            pending: DashMap::new(),
            generator,
            default_timeout,
            metrics,
        }
    }

    /// Register a pending request and get a receiver for its settlement.
    ///
    /// The returned ID is never shared with another live entry; a colliding
    /// ID from the generator is discarded and a new one drawn.
    pub fn register(
        &self,
        method: &str,
        timeout: Option<Duration>,
    ) -> (RequestId, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();

        let request_id = loop {
            let candidate = self.generator.next_id();
            match self.pending.entry(candidate) {
                Entry::Occupied(slot) => {
                    warn!(request_id = %slot.key(), "Generated ID already pending, drawing again");
                }
                Entry::Vacant(slot) => {
                    let request_id = slot.key().clone();
                    slot.insert(PendingRequest {
                        sender: tx,
                        created_at: Instant::now(),
                        method: method.to_string(),
                        timeout: timeout.or(self.default_timeout),
                    });
                    break request_id;
                }
            }
        };

        MuxMetrics::incr(&self.metrics.requests_registered);
        debug!(request_id = %request_id, method = method, "Registered pending request");

        (request_id, rx)
    }

    /// Settle a pending request.
    ///
    /// Returns `true` if an entry was found (and is now gone). Unknown IDs
    /// return `false` and change nothing.
    pub fn settle(&self, request_id: &str, outcome: Result<Value, RemoteError>) -> bool {
        let Some((request_id, pending)) = self.pending.remove(request_id) else {
            // Late, duplicate and foreign deliveries all land here and are
            // dropped. A double delivery from a faulty remote is
            // indistinguishable from a stale one; tighten this into an
            // error if the remote ever guarantees exactly-once results.
            MuxMetrics::incr(&self.metrics.unknown_correlations);
            warn!(request_id = request_id, "Result for unknown or settled request ID");
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        let rejected = outcome.is_err();
        let settlement = outcome.map_err(MuxError::Remote);

        match pending.sender.send(settlement) {
            Ok(()) => {
                if rejected {
                    MuxMetrics::incr(&self.metrics.requests_rejected);
                } else {
                    MuxMetrics::incr(&self.metrics.requests_settled);
                }
                debug!(
                    request_id = %request_id,
                    method = %pending.method,
                    rejected = rejected,
                    response_time_ms = elapsed.as_millis() as u64,
                    "Settled pending request"
                );
            }
            Err(_) => {
                MuxMetrics::incr(&self.metrics.requests_abandoned);
                debug!(
                    request_id = %request_id,
                    method = %pending.method,
                    "Pending request waiter dropped before settlement"
                );
            }
        }
        true
    }

    /// Remove requests older than their timeout, rejecting their waiters
    /// with [`MuxError::Expired`]. Returns the number removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for request_id in expired {
            // A settle may have won the race since the scan.
            let Some((request_id, pending)) = self
                .pending
                .remove_if(&request_id, |_, request| request.is_expired(now))
            else {
                continue;
            };

            let elapsed_ms = now.duration_since(pending.created_at).as_millis() as u64;
            warn!(
                request_id = %request_id,
                method = %pending.method,
                elapsed_ms = elapsed_ms,
                "Removing expired pending request"
            );
            let _ = pending.sender.send(Err(MuxError::Expired {
                request_id,
                method: pending.method,
                elapsed_ms,
            }));
            MuxMetrics::incr(&self.metrics.requests_expired);
            removed += 1;
        }

        removed
    }

    /// Drop a pending request without settling it. Its waiter observes
    /// [`MuxError::Closed`].
    pub fn cancel(&self, request_id: &str) -> bool {
        if self.pending.remove(request_id).is_some() {
            MuxMetrics::incr(&self.metrics.requests_abandoned);
            true
        } else {
            false
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    /// Method name a pending request was issued for.
    pub fn method_of(&self, request_id: &str) -> Option<String> {
        self.pending.get(request_id).map(|r| r.method.clone())
    }
}

/// Background task that periodically sweeps expired requests.
///
/// Ends on its own once the store has been dropped.
pub async fn expiry_sweeper(store: Weak<PendingRequestStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            debug!("Pending request store dropped, stopping expiry sweeper");
            break;
        };
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Swept expired pending requests");
        }
    }
}
