//! Error types for the multiplexer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::domain::correlation::RequestId;

/// Errors surfaced to callers of the multiplexer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MuxError {
    /// The remote side settled the request with an error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The outbound envelope could not be handed to the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No response arrived before the configured request timeout.
    #[error("request {request_id} ({method}) expired after {elapsed_ms}ms")]
    Expired {
        request_id: RequestId,
        method: String,
        elapsed_ms: u64,
    },

    /// The pending entry was dropped without being settled.
    #[error("request {request_id} was dropped before settlement")]
    Closed { request_id: RequestId },
}

/// Error value reported by the remote dispatcher.
///
/// The shape is opaque: it is carried as-is and only rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteError(Value);

impl RemoteError {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// Interpret the `error` field of a result delivery.
    ///
    /// Falsy values (`null`, `false`, `0`, `""`) mean "no error".
    pub fn from_wire(error: Value) -> Option<Self> {
        if is_reported(&error) {
            Some(Self(error))
        } else {
            None
        }
    }

    /// The error as a plain string, when the remote sent one.
    pub fn message(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for RemoteError {}

fn is_reported(error: &Value) -> bool {
    match error {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("channel closed")]
    ChannelClosed,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Inbound frame could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed inbound message: {0}")]
    Malformed(String),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("sweep interval cannot be 0 when a request timeout is set")]
    ZeroSweepInterval,

    #[error("request timeout cannot be 0")]
    ZeroTimeout,

    #[error("channel capacity cannot be 0")]
    ZeroChannelCapacity,
}
