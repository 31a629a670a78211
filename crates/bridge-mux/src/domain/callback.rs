//! Stored callbacks and isolated invocation.

use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Callback stored by the listener and subscription registries.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Run a callback, containing any panic it raises.
///
/// Returns `false` if the callback panicked. One failing callback must not
/// stop the rest of a fan-out.
pub(crate) fn invoke_isolated(callback: &Callback, payload: &Value) -> bool {
    panic::catch_unwind(AssertUnwindSafe(|| callback(payload))).is_ok()
}
