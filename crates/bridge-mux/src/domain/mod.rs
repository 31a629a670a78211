//! Domain layer: identifiers, topics, the three registries and configuration.
//!
//! Nothing in here performs I/O; the facade in `service` wires these to a
//! transport.

pub mod callback;
pub mod config;
pub mod correlation;
pub mod listeners;
pub mod pending;
pub mod subscriptions;
pub mod topic;

// Re-exports for convenience
pub use callback::Callback;
pub use config::MuxConfig;
pub use correlation::{
    IdGenerator, IdStrategy, RequestId, SequentialGenerator, SubscriptionId, UuidV7Generator,
};
pub use listeners::{LifecycleEvent, ListenerRegistry};
pub use pending::{expiry_sweeper, PendingRequestStore, Settlement};
pub use subscriptions::{Subscriber, SubscriptionRegistry};
pub use topic::{derive_topic, Topic};
