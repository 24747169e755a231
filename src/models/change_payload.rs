use serde_json::Value as JsonValue;

use super::realtime_event::RealtimeEvent;

/// Typed change notification delivered to channel handlers.
///
/// `new`/`old` are snapshots of the row after/before the change and are
/// absent depending on the event kind (an insert has no `old`, a delete has
/// no `new`).  `raw` preserves the full decoded payload so callers can read
/// server fields this client does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePayload {
    /// The change kind (never `All`).
    pub event: RealtimeEvent,
    /// Table name, derived from the topic (`table:users` → `users`).
    pub table: String,
    /// Row values after the change, when present.
    pub new: Option<JsonValue>,
    /// Row values before the change, when present.
    pub old: Option<JsonValue>,
    /// The full decoded wire payload, kept for forward compatibility.
    pub raw: JsonValue,
}

impl ChangePayload {
    /// The row after the change, if the event carries one.
    pub fn record(&self) -> Option<&JsonValue> {
        self.new.as_ref()
    }

    /// The row before the change, if the event carries one.
    pub fn old_record(&self) -> Option<&JsonValue> {
        self.old.as_ref()
    }
}
