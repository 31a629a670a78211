//! Subscription registry: topic-keyed fan-out with per-subscriber identity.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::callback::{invoke_isolated, Callback};
use crate::domain::correlation::{IdGenerator, SubscriptionId};
use crate::domain::topic::Topic;
use crate::metrics::MuxMetrics;

/// One subscriber under a topic.
#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriptionId,
    callback: Callback,
}

/// Subscription registry.
///
/// Any number of subscribers may share a topic; each one is removable on its
/// own by its ID, or all at once by clearing the topic.
pub struct SubscriptionRegistry {
    topics: DashMap<Topic, Vec<Subscriber>>,
    generator: Arc<dyn IdGenerator>,
    metrics: Arc<MuxMetrics>,
}

impl SubscriptionRegistry {
    pub fn new(generator: Arc<dyn IdGenerator>, metrics: Arc<MuxMetrics>) -> Self {
        Self {
            topics: DashMap::new(),
            generator,
            metrics,
        }
    }

    /// Append a subscriber under `topic`.
    pub fn subscribe(&self, topic: Topic, callback: Callback) -> SubscriptionId {
        let id = self.generator.next_id();
        debug!(subscription_id = %id, topic = %topic, "Created subscription");

        self.topics.entry(topic).or_default().push(Subscriber {
            id: id.clone(),
            callback,
        });
        id
    }

    /// Invoke every subscriber under `topic`, in registration order.
    ///
    /// Unknown topics are a no-op. Returns how many subscribers ran without
    /// panicking.
    pub fn publish(&self, topic: &Topic, payload: &Value) -> usize {
        // Clone out of the map: the shard lock must not be held while
        // subscriber code runs.
        let Some(subscribers) = self.topics.get(topic).map(|entry| entry.value().clone()) else {
            debug!(topic = %topic, "Publish for topic without subscribers");
            return 0;
        };

        let mut delivered = 0;
        for subscriber in &subscribers {
            if invoke_isolated(&subscriber.callback, payload) {
                delivered += 1;
            } else {
                MuxMetrics::incr(&self.metrics.callback_failures);
                warn!(
                    subscription_id = %subscriber.id,
                    topic = %topic,
                    "Subscriber callback panicked"
                );
            }
        }

        MuxMetrics::add(&self.metrics.publishes_delivered, subscribers.len());
        debug!(topic = %topic, subscribers = subscribers.len(), "Published notification");
        delivered
    }

    /// Remove subscribers.
    ///
    /// With `id == None` the whole topic is dropped; otherwise only the
    /// matching subscriber is removed and the rest keep their order.
    /// Unknown topics or IDs are a no-op. Returns the number removed.
    pub fn unsubscribe(&self, topic: &Topic, id: Option<&str>) -> usize {
        let removed = match id {
            None => self
                .topics
                .remove(topic)
                .map_or(0, |(_, subscribers)| subscribers.len()),
            Some(id) => {
                let removed = match self.topics.get_mut(topic) {
                    Some(mut subscribers) => {
                        let before = subscribers.len();
                        subscribers.retain(|s| s.id.as_str() != id);
                        before - subscribers.len()
                    }
                    None => 0,
                };
                self.topics.remove_if(topic, |_, subscribers| subscribers.is_empty());
                removed
            }
        };

        if removed > 0 {
            debug!(
                topic = %topic,
                subscription_id = ?id,
                removed = removed,
                "Removed subscription"
            );
        }
        removed
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map_or(0, |entry| entry.len())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// IDs under `topic`, in registration order.
    pub fn subscriber_ids(&self, topic: &Topic) -> Vec<SubscriptionId> {
        self.topics
            .get(topic)
            .map(|entry| entry.iter().map(|s| s.id.clone()).collect())
            .unwrap_or_default()
    }
}
