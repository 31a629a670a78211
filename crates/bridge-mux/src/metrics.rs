//! Counters for multiplexer traffic.
//!
//! Every registry shares one [`MuxMetrics`] through an `Arc`; a
//! [`MetricsSnapshot`] is a plain copy suitable for logging or assertions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters.
#[derive(Debug, Default)]
pub struct MuxMetrics {
    /// Requests registered in the correlation registry
    pub requests_registered: AtomicU64,
    /// Requests settled with a result
    pub requests_settled: AtomicU64,
    /// Requests settled with a remote error
    pub requests_rejected: AtomicU64,
    /// Requests swept after their timeout
    pub requests_expired: AtomicU64,
    /// Settlements whose waiter was already gone, plus cancellations
    pub requests_abandoned: AtomicU64,
    /// Inbound deliveries addressed to an unknown identifier
    pub unknown_correlations: AtomicU64,
    /// Subscriber callbacks invoked by publishes
    pub publishes_delivered: AtomicU64,
    /// Lifecycle listener callbacks invoked
    pub direct_dispatches: AtomicU64,
    /// Callbacks that panicked
    pub callback_failures: AtomicU64,
    /// Inbound frames dropped as unrecognisable
    pub malformed_inbound: AtomicU64,
}

impl MuxMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_registered: self.requests_registered.load(Ordering::Relaxed),
            requests_settled: self.requests_settled.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            requests_expired: self.requests_expired.load(Ordering::Relaxed),
            requests_abandoned: self.requests_abandoned.load(Ordering::Relaxed),
            unknown_correlations: self.unknown_correlations.load(Ordering::Relaxed),
            publishes_delivered: self.publishes_delivered.load(Ordering::Relaxed),
            direct_dispatches: self.direct_dispatches.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            malformed_inbound: self.malformed_inbound.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MuxMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub requests_registered: u64,
    pub requests_settled: u64,
    pub requests_rejected: u64,
    pub requests_expired: u64,
    pub requests_abandoned: u64,
    pub unknown_correlations: u64,
    pub publishes_delivered: u64,
    pub direct_dispatches: u64,
    pub callback_failures: u64,
    pub malformed_inbound: u64,
}

impl MetricsSnapshot {
    /// Requests registered but not yet settled, expired or abandoned.
    pub fn in_flight(&self) -> u64 {
        self.requests_registered.saturating_sub(
            self.requests_settled
                + self.requests_rejected
                + self.requests_expired
                + self.requests_abandoned,
        )
    }
}
