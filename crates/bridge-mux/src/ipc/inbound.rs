//! Inbound messages (remote dispatcher → transport → core).
//!
//! Frames are normally tagged with `op`. The legacy `rpc-direct`,
//! `rpc-result` and `rpc-pub` names and `rid`/`method` field names are
//! accepted as aliases, and untagged frames are classified by shape.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::correlation::RequestId;
use crate::error::DecodeError;

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Recurring lifecycle delivery addressed to a listener ID.
    #[serde(alias = "rpc-direct")]
    Direct {
        #[serde(alias = "rid", deserialize_with = "wire_id")]
        id: RequestId,
        #[serde(default)]
        result: Value,
    },
    /// Settlement of a pending request.
    #[serde(alias = "rpc-result")]
    Result {
        #[serde(alias = "rid", deserialize_with = "wire_id")]
        id: RequestId,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Value,
    },
    /// Notification for every subscriber of the subject's topic.
    #[serde(alias = "rpc-pub")]
    Publish {
        #[serde(alias = "method")]
        subject: String,
        #[serde(default)]
        result: Value,
    },
}

impl InboundMessage {
    pub fn direct(id: impl Into<RequestId>, result: Value) -> Self {
        Self::Direct {
            id: id.into(),
            result,
        }
    }

    pub fn result(id: impl Into<RequestId>, result: Value, error: Value) -> Self {
        Self::Result {
            id: id.into(),
            result,
            error,
        }
    }

    pub fn publish(subject: impl Into<String>, result: Value) -> Self {
        Self::Publish {
            subject: subject.into(),
            result,
        }
    }

    /// Decode a raw frame.
    ///
    /// Untagged frames: an `id` plus an `error` key is a result, an `id`
    /// alone is a direct delivery, a `subject` without `id` is a publish.
    pub fn from_json(frame: &Value) -> Result<Self, DecodeError> {
        let obj = frame
            .as_object()
            .ok_or_else(|| DecodeError::Malformed("frame is not an object".into()))?;

        if obj.contains_key("op") {
            return serde_json::from_value(frame.clone())
                .map_err(|e| DecodeError::Malformed(e.to_string()));
        }

        let result = obj.get("result").cloned().unwrap_or(Value::Null);

        if let Some(id) = identifier(obj) {
            return Ok(match obj.get("error") {
                Some(error) => Self::result(id, result, error.clone()),
                None => Self::direct(id, result),
            });
        }

        match obj.get("subject").or_else(|| obj.get("method")) {
            Some(Value::String(subject)) => Ok(Self::publish(subject.clone(), result)),
            _ => Err(DecodeError::Malformed(
                "frame carries neither an identifier nor a subject".into(),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Result { .. } => "result",
            Self::Publish { .. } => "publish",
        }
    }
}

/// Identifiers are non-empty strings or numbers on every path.
fn id_from_value(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(RequestId::new(s.clone())),
        Value::Number(n) => Some(RequestId::new(n.to_string())),
        _ => None,
    }
}

fn identifier(obj: &Map<String, Value>) -> Option<RequestId> {
    id_from_value(obj.get("id").or_else(|| obj.get("rid"))?)
}

fn wire_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RequestId, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value)
        .ok_or_else(|| D::Error::custom("identifier must be a non-empty string or a number"))
}
