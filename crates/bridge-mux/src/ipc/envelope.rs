//! Outbound envelopes (core → transport → remote dispatcher).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::correlation::RequestId;
use crate::domain::listeners::LifecycleEvent;

/// Operation name of a forwarded call.
pub const CALL_OP: &str = "call";
/// Operation name of a disconnect request.
pub const DISCONNECT_OP: &str = "disconnect";

/// One outbound message.
///
/// | Kind | `op` | `method` | `args` | `id` |
/// |------|------|----------|--------|------|
/// | call | `"call"` | method | `[method, data]` | yes |
/// | lifecycle registration | `"onConnect"`, ... | - | `[{}]` | yes |
/// | disconnect | `"disconnect"` | - | `[{}]` | - |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Envelope {
    /// Forward `method(data)` to the remote dispatcher.
    pub fn call(id: RequestId, method: &str, data: Value) -> Self {
        Self {
            op: CALL_OP.to_string(),
            method: Some(method.to_string()),
            args: vec![Value::String(method.to_string()), data],
            id: Some(id),
        }
    }

    /// Tell the remote side a listener was registered for `event`.
    pub fn lifecycle(event: LifecycleEvent, id: RequestId) -> Self {
        Self {
            op: event.op_name().to_string(),
            method: None,
            args: vec![json!({})],
            id: Some(id),
        }
    }

    pub fn disconnect() -> Self {
        Self {
            op: DISCONNECT_OP.to_string(),
            method: None,
            args: vec![json!({})],
            id: None,
        }
    }

    pub fn is_call(&self) -> bool {
        self.op == CALL_OP
    }

    /// Lifecycle event of a listener registration envelope.
    pub fn lifecycle_event(&self) -> Option<LifecycleEvent> {
        LifecycleEvent::from_op_name(&self.op)
    }

    /// Method name of a call envelope, from `method` or the first argument.
    pub fn call_method(&self) -> Option<&str> {
        if !self.is_call() {
            return None;
        }
        self.method
            .as_deref()
            .or_else(|| self.args.first().and_then(Value::as_str))
    }

    /// Payload of a call envelope (second argument).
    pub fn call_data(&self) -> Option<&Value> {
        if self.is_call() {
            self.args.get(1)
        } else {
            None
        }
    }
}
