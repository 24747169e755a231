//! Channel: one topic subscription.
//!
//! A channel owns its join/leave state machine and the registry of change
//! handlers for its topic.  It does not own the socket: it holds a
//! non-owning back-reference to the shared core and requests sends through
//! it.  Sends are fire-and-forget: when the socket is not open the frame is
//! dropped with a logged warning and, for joins, the optimistic `Joined`
//! state ensures the channel is joined on the next (re)connect.

use std::sync::{Arc, Mutex, Weak};

use serde_json::json;

use crate::connection::SocketCore;
use crate::models::{ChangePayload, JoinState, RealtimeEvent};

/// Join control event sent when subscribing.
pub(crate) const EVENT_JOIN: &str = "phx_join";

/// Leave control event sent when unsubscribing.
pub(crate) const EVENT_LEAVE: &str = "phx_leave";

/// Handler invoked with a typed change notification.
///
/// Handlers are identified by `Arc` pointer identity: registering the same
/// `Arc` twice for one event kind is a no-op, and [`Channel::off`] removes
/// by the same identity.
pub type ChangeHandler = Arc<dyn Fn(&ChangePayload) + Send + Sync>;

/// Ordered handler sets, one per change kind plus the wildcard set.
#[derive(Default)]
struct HandlerTable {
    insert: Vec<ChangeHandler>,
    update: Vec<ChangeHandler>,
    delete: Vec<ChangeHandler>,
    wildcard: Vec<ChangeHandler>,
}

impl HandlerTable {
    fn slot(&self, kind: RealtimeEvent) -> &Vec<ChangeHandler> {
        match kind {
            RealtimeEvent::Insert => &self.insert,
            RealtimeEvent::Update => &self.update,
            RealtimeEvent::Delete => &self.delete,
            RealtimeEvent::All => &self.wildcard,
        }
    }

    fn slot_mut(&mut self, kind: RealtimeEvent) -> &mut Vec<ChangeHandler> {
        match kind {
            RealtimeEvent::Insert => &mut self.insert,
            RealtimeEvent::Update => &mut self.update,
            RealtimeEvent::Delete => &mut self.delete,
            RealtimeEvent::All => &mut self.wildcard,
        }
    }
}

/// Client-side handle for one topic subscription.
///
/// Obtained from [`crate::RealtimeClient::channel`], which returns the same
/// instance for repeated requests of one topic until the channel is removed
/// by [`Channel::unsubscribe`].
pub struct Channel {
    topic: String,
    join_state: Mutex<JoinState>,
    handlers: Mutex<HandlerTable>,
    /// Non-owning back-reference for sends; the core owns channel lifetime
    /// through its registry.
    socket: Weak<SocketCore>,
}

impl Channel {
    pub(crate) fn new(topic: String, socket: Weak<SocketCore>) -> Arc<Self> {
        Arc::new(Self {
            topic,
            join_state: Mutex::new(JoinState::Unjoined),
            handlers: Mutex::new(HandlerTable::default()),
            socket,
        })
    }

    /// The topic this channel is subscribed to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Current join state.
    pub fn join_state(&self) -> JoinState {
        *self.join_state.lock().unwrap()
    }

    /// Whether the channel considers itself joined.
    pub fn is_joined(&self) -> bool {
        self.join_state() == JoinState::Joined
    }

    /// Register a handler for an event kind (or [`RealtimeEvent::All`] for
    /// every change).  Idempotent per `(kind, handler identity)`; chainable.
    pub fn on(&self, kind: RealtimeEvent, handler: ChangeHandler) -> &Self {
        let mut table = self.handlers.lock().unwrap();
        let slot = table.slot_mut(kind);
        if !slot.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            slot.push(handler);
        }
        self
    }

    /// Remove a previously registered handler by identity.  No-op if the
    /// handler is not registered for that kind; chainable.
    pub fn off(&self, kind: RealtimeEvent, handler: &ChangeHandler) -> &Self {
        let mut table = self.handlers.lock().unwrap();
        table.slot_mut(kind).retain(|h| !Arc::ptr_eq(h, handler));
        self
    }

    /// Join the topic.
    ///
    /// No-op when already `Joining`/`Joined`.  Sends a `phx_join` frame and
    /// transitions to `Joined` immediately on send; the client does not
    /// wait for a server acknowledgement.  If the socket is not open the
    /// frame is dropped and the join happens on the next (re)connect.
    pub fn subscribe(&self) {
        {
            let mut state = self.join_state.lock().unwrap();
            match *state {
                JoinState::Joining | JoinState::Joined => return,
                _ => *state = JoinState::Joined,
            }
        }
        log::debug!("[realtime-link] joining '{}'", self.topic);
        self.push_control(EVENT_JOIN);
    }

    /// Leave the topic and remove the channel from the registry.
    ///
    /// No-op unless `Joined`.  Sends a best-effort `phx_leave` frame; the
    /// local teardown is synchronous and does not wait for the server.
    pub fn unsubscribe(&self) {
        {
            let mut state = self.join_state.lock().unwrap();
            if *state != JoinState::Joined {
                return;
            }
            *state = JoinState::Leaving;
        }
        log::debug!("[realtime-link] leaving '{}'", self.topic);
        self.push_control(EVENT_LEAVE);
        if let Some(core) = self.socket.upgrade() {
            core.registry.remove(&self.topic);
        }
    }

    /// Invoke handlers for a change: first those registered for the event
    /// kind, then the wildcard handlers, each in registration order.
    ///
    /// The handler lists are snapshotted before invocation, so a handler
    /// may call back into `on`/`off`/`subscribe`/`unsubscribe` freely.
    pub(crate) fn dispatch(&self, payload: &ChangePayload) {
        let snapshot: Vec<ChangeHandler> = {
            let table = self.handlers.lock().unwrap();
            table
                .slot(payload.event)
                .iter()
                .chain(table.wildcard.iter())
                .cloned()
                .collect()
        };
        for handler in snapshot {
            handler(payload);
        }
    }

    /// Revert the join bookkeeping on explicit disconnect.  The channel and
    /// its handlers stay registered.
    pub(crate) fn mark_unjoined(&self) {
        *self.join_state.lock().unwrap() = JoinState::Unjoined;
    }

    fn push_control(&self, event: &str) {
        match self.socket.upgrade() {
            Some(core) => core.push_frame(&self.topic, event, json!({})),
            None => log::warn!(
                "[realtime-link] connection dropped, '{}' frame for '{}' discarded",
                event,
                self.topic
            ),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("topic", &self.topic)
            .field("join_state", &self.join_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionOptions;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn change(event: RealtimeEvent) -> ChangePayload {
        ChangePayload {
            event,
            table: "users".to_string(),
            new: Some(json!({"id": 1})),
            old: None,
            raw: json!({}),
        }
    }

    fn detached_channel(topic: &str) -> Arc<Channel> {
        Channel::new(topic.to_string(), Weak::new())
    }

    #[test]
    fn test_on_is_idempotent_per_handler_identity() {
        let channel = detached_channel("table:users");
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let handler: ChangeHandler = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        channel
            .on(RealtimeEvent::Insert, handler.clone())
            .on(RealtimeEvent::Insert, handler.clone());
        channel.dispatch(&change(RealtimeEvent::Insert));

        assert_eq!(count.load(Ordering::SeqCst), 1, "duplicate registration must be a no-op");
    }

    #[test]
    fn test_off_removes_by_identity() {
        let channel = detached_channel("table:users");
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let handler: ChangeHandler = Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        channel.on(RealtimeEvent::Insert, handler.clone());
        channel.off(RealtimeEvent::Insert, &handler);
        channel.dispatch(&change(RealtimeEvent::Insert));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispatch_order_kind_then_wildcard() {
        let channel = detached_channel("table:users");
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        channel.on(RealtimeEvent::Insert, Arc::new(move |_| o.lock().unwrap().push("insert")));
        let o = order.clone();
        channel.on(RealtimeEvent::All, Arc::new(move |_| o.lock().unwrap().push("wildcard")));

        channel.dispatch(&change(RealtimeEvent::Insert));
        assert_eq!(*order.lock().unwrap(), vec!["insert", "wildcard"]);
    }

    #[test]
    fn test_dispatch_skips_other_kinds() {
        let channel = detached_channel("table:users");
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        channel.on(
            RealtimeEvent::Delete,
            Arc::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        channel.dispatch(&change(RealtimeEvent::Insert));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_mutate_registrations_mid_dispatch() {
        // The dispatch snapshot must allow a handler to unregister itself
        // without deadlocking or corrupting the set being iterated.
        let channel = detached_channel("table:users");
        let count = Arc::new(AtomicUsize::new(0));

        let channel_clone = channel.clone();
        let count_clone = count.clone();
        let handler: ChangeHandler = Arc::new(move |payload| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            channel_clone.on(RealtimeEvent::Delete, Arc::new(|_| {}));
            assert_eq!(payload.table, "users");
        });

        channel.on(RealtimeEvent::Insert, handler.clone());
        channel.dispatch(&change(RealtimeEvent::Insert));
        channel.off(RealtimeEvent::Insert, &handler);
        channel.dispatch(&change(RealtimeEvent::Insert));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_is_optimistic_and_idempotent() {
        let core = SocketCore::new(ConnectionOptions::default());
        let channel = core.registry.get_or_create("table:orders", Arc::downgrade(&core));

        assert_eq!(channel.join_state(), JoinState::Unjoined);
        channel.subscribe();
        assert_eq!(channel.join_state(), JoinState::Joined, "joined immediately upon send");
        channel.subscribe(); // no-op
        assert_eq!(channel.join_state(), JoinState::Joined);
    }

    #[test]
    fn test_unsubscribe_requires_joined_and_removes_from_registry() {
        let core = SocketCore::new(ConnectionOptions::default());
        let channel = core.registry.get_or_create("table:orders", Arc::downgrade(&core));

        // Not joined yet: no-op, stays registered
        channel.unsubscribe();
        assert!(core.registry.get("table:orders").is_some());

        channel.subscribe();
        channel.unsubscribe();
        assert!(core.registry.get("table:orders").is_none());
        assert_eq!(channel.join_state(), JoinState::Leaving);
    }
}
