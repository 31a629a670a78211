//! Direct-listener registry for recurring lifecycle notifications.
//!
//! Unlike pending requests, listeners are not one-shot: every delivery for a
//! lifecycle event fires every listener registered under it, in registration
//! order, for as long as the listener stays registered.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::callback::{invoke_isolated, Callback};
use crate::domain::correlation::{IdGenerator, RequestId};
use crate::metrics::MuxMetrics;

/// Fixed lifecycle event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    #[serde(rename = "onConnect")]
    Connect,
    #[serde(rename = "onDisconnect")]
    Disconnect,
    #[serde(rename = "onConnectFailure")]
    ConnectFailure,
    #[serde(rename = "onError")]
    Error,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 4] = [
        LifecycleEvent::Connect,
        LifecycleEvent::Disconnect,
        LifecycleEvent::ConnectFailure,
        LifecycleEvent::Error,
    ];

    /// Operation name used on the wire when registering a listener.
    pub fn op_name(self) -> &'static str {
        match self {
            LifecycleEvent::Connect => "onConnect",
            LifecycleEvent::Disconnect => "onDisconnect",
            LifecycleEvent::ConnectFailure => "onConnectFailure",
            LifecycleEvent::Error => "onError",
        }
    }

    pub fn from_op_name(op: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.op_name() == op)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op_name())
    }
}

struct ListenerEntry {
    id: RequestId,
    callback: Callback,
}

#[derive(Default)]
struct ListenerTable {
    by_event: HashMap<LifecycleEvent, Vec<ListenerEntry>>,
    /// Reverse lookup so inbound deliveries can address listeners by ID.
    by_id: HashMap<RequestId, LifecycleEvent>,
}

/// Listener registry keyed by lifecycle event.
pub struct ListenerRegistry {
    table: Mutex<ListenerTable>,
    generator: Arc<dyn IdGenerator>,
    metrics: Arc<MuxMetrics>,
}

impl ListenerRegistry {
    pub fn new(generator: Arc<dyn IdGenerator>, metrics: Arc<MuxMetrics>) -> Self {
        Self {
            table: Mutex::new(ListenerTable::default()),
            generator,
            metrics,
        }
    }

    /// Append a listener under `event`.
    pub fn add(&self, event: LifecycleEvent, callback: Callback) -> RequestId {
        let mut table = self.table.lock();

        let mut id = self.generator.next_id();
        while table.by_id.contains_key(&id) {
            id = self.generator.next_id();
        }

        table.by_id.insert(id.clone(), event);
        table.by_event.entry(event).or_default().push(ListenerEntry {
            id: id.clone(),
            callback,
        });

        debug!(listener_id = %id, event = %event, "Registered lifecycle listener");
        id
    }

    /// Lifecycle event a listener ID was registered under.
    pub fn event_for(&self, id: &str) -> Option<LifecycleEvent> {
        self.table.lock().by_id.get(id).copied()
    }

    /// Invoke every listener under `event` with `payload`, in registration
    /// order. Returns how many listeners ran without panicking.
    pub fn dispatch(&self, event: LifecycleEvent, payload: &Value) -> usize {
        // Snapshot so listeners may register or remove listeners themselves.
        let targets: Vec<(RequestId, Callback)> = {
            let table = self.table.lock();
            match table.by_event.get(&event) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| (entry.id.clone(), entry.callback.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, callback) in &targets {
            if invoke_isolated(callback, payload) {
                delivered += 1;
            } else {
                MuxMetrics::incr(&self.metrics.callback_failures);
                warn!(listener_id = %id, event = %event, "Lifecycle listener panicked");
            }
        }

        MuxMetrics::add(&self.metrics.direct_dispatches, targets.len());
        debug!(event = %event, listeners = targets.len(), "Dispatched lifecycle event");
        delivered
    }

    /// Remove one listener. Returns `false` for unknown IDs.
    pub fn remove(&self, id: &str) -> bool {
        let mut table = self.table.lock();
        let Some(event) = table.by_id.remove(id) else {
            return false;
        };

        if let Some(entries) = table.by_event.get_mut(&event) {
            entries.retain(|entry| entry.id.as_str() != id);
            if entries.is_empty() {
                table.by_event.remove(&event);
            }
        }

        debug!(listener_id = id, event = %event, "Removed lifecycle listener");
        true
    }

    pub fn listener_count(&self, event: LifecycleEvent) -> usize {
        self.table
            .lock()
            .by_event
            .get(&event)
            .map_or(0, Vec::len)
    }
}
