//! Correlation identifiers for request tracking.
//!
//! Identifiers are opaque strings on the wire. Locally they are minted by an
//! [`IdGenerator`]; the default one uses UUID v7, which is time-ordered and
//! carries 74 random bits per identifier.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ConfigError;

/// Identifier linking an outbound request, listener or subscription to the
/// inbound messages that address it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

/// Subscriptions share the request identifier space.
pub type SubscriptionId = RequestId;

impl RequestId {
    /// Wrap an identifier received from the remote side.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RequestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Source of identifiers that are unique among everything outstanding
/// within one process lifetime.
pub trait IdGenerator: Send + Sync {
    /// Mint the next identifier.
    fn next_id(&self) -> RequestId;
}

/// UUID v7 identifiers (time-ordered, random tail).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> RequestId {
        RequestId(Uuid::now_v7().to_string())
    }
}

/// Counter identifiers prefixed with a per-process random salt.
///
/// Shorter than UUIDs and strictly increasing within one generator, which
/// makes log lines easy to follow.
#[derive(Debug)]
pub struct SequentialGenerator {
    salt: u64,
    counter: AtomicU64,
}

impl SequentialGenerator {
    /// Create a generator with a random salt.
    pub fn new() -> Self {
        Self::with_salt(rand::random())
    }

    /// Create a generator with a fixed salt.
    pub fn with_salt(salt: u64) -> Self {
        Self {
            salt,
            counter: AtomicU64::new(1),
        }
    }

    /// The salt every identifier from this generator starts with.
    pub fn salt(&self) -> u64 {
        self.salt
    }
}

impl Default for SequentialGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialGenerator {
    fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("{:016x}-{:x}", self.salt, n))
    }
}

/// Which generator a multiplexer is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    UuidV7,
    Sequential,
}

impl IdStrategy {
    /// Build a fresh generator for this strategy.
    pub fn build(self) -> Arc<dyn IdGenerator> {
        match self {
            IdStrategy::UuidV7 => Arc::new(UuidV7Generator),
            IdStrategy::Sequential => Arc::new(SequentialGenerator::new()),
        }
    }
}

impl FromStr for IdStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uuid" | "uuid_v7" | "uuidv7" => Ok(IdStrategy::UuidV7),
            "sequential" | "counter" => Ok(IdStrategy::Sequential),
            other => Err(ConfigError::InvalidValue {
                key: "id_strategy".into(),
                value: other.to_string(),
            }),
        }
    }
}
