//! Notification topic names.
//!
//! A subscription request subject such as `notifyBlockAddedRequest` maps to
//! the topic its notifications arrive under, `blockAddedNotification`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

const NOTIFY_MARKER: &str = "notify";
const REQUEST_MARKER: &str = "Request";
const NOTIFICATION_MARKER: &str = "Notification";

/// Canonical fan-out key for publish/subscribe delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Derive the topic for a request subject.
    pub fn from_subject(subject: &str) -> Self {
        derive_topic(subject)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Map a request subject to its notification topic.
///
/// Drops the first `notify` marker, turns the first `Request` marker into
/// `Notification` and lower-cases the leading character. Total and pure:
/// subjects outside the naming convention still map to some fixed string.
/// A topic derived from a conventional `notify…Request` subject maps to
/// itself, so publishers may address either form.
pub fn derive_topic(subject: &str) -> Topic {
    let name = subject
        .replacen(NOTIFY_MARKER, "", 1)
        .replacen(REQUEST_MARKER, NOTIFICATION_MARKER, 1);

    let mut chars = name.chars();
    let topic = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    };
    Topic(topic)
}
