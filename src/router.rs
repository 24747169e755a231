//! Inbound frame router.
//!
//! Demultiplexes decoded frames onto channels: filters control traffic,
//! normalizes the event name onto the closed change-event set, derives the
//! table name from the topic, and dispatches a [`ChangePayload`] to the
//! matching channel's handlers.

use serde_json::Value as JsonValue;

use crate::connection::SocketCore;
use crate::frame::Frame;
use crate::models::{ChangePayload, ConnectionState, RealtimeEvent};

/// Topic carrying protocol control traffic (heartbeats and their acks).
pub(crate) const CONTROL_TOPIC: &str = "phoenix";

/// Server-originated control events, never dispatched to handlers.
const SYSTEM_EVENTS: &[&str] = &["phx_reply", "phx_close"];

/// Topic prefix for row-change subscriptions; stripped to obtain the table
/// name.
const TABLE_TOPIC_PREFIX: &str = "table:";

/// Route one decoded frame.
///
/// Discards control traffic and frames for untracked topics; everything
/// else becomes a [`ChangePayload`] dispatched to the topic's channel.
/// Dispatch is refused while the connection is anything but `Connected`.
pub(crate) fn route_frame(core: &SocketCore, frame: &Frame) {
    if frame.topic == CONTROL_TOPIC && frame.event == "phx_reply" {
        log::trace!("[realtime-link] heartbeat ack (ref {})", frame.frame_ref);
        return;
    }

    let channel = match core.registry.get(&frame.topic) {
        Some(channel) => channel,
        None => {
            // A channel the client no longer tracks (e.g. unsubscribed);
            // not an error.
            log::debug!("[realtime-link] no channel for topic '{}', frame dropped", frame.topic);
            return;
        },
    };

    if SYSTEM_EVENTS.contains(&frame.event.as_str()) {
        log::trace!("[realtime-link] system event '{}' on '{}'", frame.event, frame.topic);
        return;
    }

    let payload = match build_change_payload(frame) {
        Some(payload) => payload,
        None => {
            log::debug!(
                "[realtime-link] unrecognized event '{}' on '{}', frame dropped",
                frame.event,
                frame.topic
            );
            return;
        },
    };

    if core.state() != ConnectionState::Connected {
        log::debug!("[realtime-link] not connected, dropping '{}' change for '{}'", payload.event, payload.table);
        return;
    }

    channel.dispatch(&payload);
}

/// Normalize a frame into a typed change payload.
///
/// A payload-level `event` field takes precedence over the frame's
/// wire-level event name; matching is case-insensitive.  Returns `None`
/// when the event maps onto none of the change kinds.
pub(crate) fn build_change_payload(frame: &Frame) -> Option<ChangePayload> {
    let wire_event = frame
        .payload
        .get("event")
        .and_then(JsonValue::as_str)
        .unwrap_or(&frame.event);
    let event = RealtimeEvent::from_wire(wire_event)?;

    let table = frame
        .topic
        .strip_prefix(TABLE_TOPIC_PREFIX)
        .unwrap_or(&frame.topic)
        .to_string();

    Some(ChangePayload {
        event,
        table,
        new: frame.payload.get("new").filter(|v| !v.is_null()).cloned(),
        old: frame.payload.get("old").filter(|v| !v.is_null()).cloned(),
        raw: frame.payload.clone(),
    })
}
