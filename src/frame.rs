//! Wire frame codec.
//!
//! Every message on the socket, in both directions, is a JSON array of
//! exactly five elements:
//!
//! ```text
//! [ join_ref | null, ref, topic, event, payload ]
//! ```
//!
//! `join_ref` correlates an event to the join that established its channel;
//! this client always sends `null` and ignores the inbound value.  Decode
//! failures are recoverable: callers drop the frame and keep reading.

use serde_json::{json, Value as JsonValue};

use crate::error::{RealtimeError, Result};

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Join correlation ref; ignored by this client.
    pub join_ref: Option<String>,
    /// Outbound message reference.
    pub frame_ref: String,
    /// Topic the frame addresses (e.g. `table:users` or `phoenix`).
    pub topic: String,
    /// Event name as sent on the wire.
    pub event: String,
    /// Frame payload; always a JSON object.
    pub payload: JsonValue,
}

/// Encode an outbound frame into its canonical array form.
///
/// `join_ref` is always serialized as `null`: outbound frames from this
/// client need no join-scoped correlation.
pub fn encode(frame_ref: &str, topic: &str, event: &str, payload: JsonValue) -> String {
    json!([JsonValue::Null, frame_ref, topic, event, payload]).to_string()
}

/// Decode one inbound frame.
///
/// Strict on the elements the router relies on: the value must be an array
/// of length ≥ 5, `topic` and `event` must be strings and `payload` must be
/// an object.  The `ref` element is accepted as a string, number, or null
/// (numbers are stringified) since the client does not correlate on it.
pub fn decode(text: &str) -> Result<Frame> {
    let value: JsonValue = serde_json::from_str(text)
        .map_err(|e| RealtimeError::DecodeError(format!("invalid JSON: {}", e)))?;

    let elements = value
        .as_array()
        .ok_or_else(|| RealtimeError::DecodeError("frame is not an array".to_string()))?;
    if elements.len() < 5 {
        return Err(RealtimeError::DecodeError(format!(
            "frame has {} element(s), expected 5",
            elements.len()
        )));
    }

    let join_ref = elements[0].as_str().map(|s| s.to_string());

    let frame_ref = match &elements[1] {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Null => String::new(),
        other => {
            return Err(RealtimeError::DecodeError(format!(
                "ref has unsupported type: {}",
                other
            )));
        },
    };

    let topic = elements[2]
        .as_str()
        .ok_or_else(|| RealtimeError::DecodeError("topic is not a string".to_string()))?
        .to_string();

    let event = elements[3]
        .as_str()
        .ok_or_else(|| RealtimeError::DecodeError("event is not a string".to_string()))?
        .to_string();

    let payload = elements[4].clone();
    if !payload.is_object() {
        return Err(RealtimeError::DecodeError(
            "payload is not an object".to_string(),
        ));
    }

    Ok(Frame {
        join_ref,
        frame_ref,
        topic,
        event,
        payload,
    })
}
