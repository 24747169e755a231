//! Channel registry: one channel per topic.
//!
//! Owned by the shared socket core.  The registry is the identity map the
//! client consults on `channel(topic)`: repeated lookups of one topic
//! return the same `Arc<Channel>` until the channel unsubscribes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::channel::Channel;
use crate::connection::SocketCore;

#[derive(Default)]
pub(crate) struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
}

impl ChannelRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Return the channel for `topic`, creating it if absent.
    pub(crate) fn get_or_create(&self, topic: &str, socket: Weak<SocketCore>) -> Arc<Channel> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(topic.to_string())
            .or_insert_with(|| Channel::new(topic.to_string(), socket))
            .clone()
    }

    /// Look up the channel for `topic` without creating one.
    pub(crate) fn get(&self, topic: &str) -> Option<Arc<Channel>> {
        self.channels.lock().unwrap().get(topic).cloned()
    }

    /// Drop the channel for `topic`.  A later `get_or_create` builds a fresh
    /// one with no handlers.
    pub(crate) fn remove(&self, topic: &str) -> Option<Arc<Channel>> {
        self.channels.lock().unwrap().remove(topic)
    }

    /// Drop every registered channel.
    pub(crate) fn clear(&self) -> Vec<Arc<Channel>> {
        self.channels.lock().unwrap().drain().map(|(_, ch)| ch).collect()
    }

    /// Topics of all registered channels.
    pub(crate) fn topics(&self) -> Vec<String> {
        self.channels.lock().unwrap().keys().cloned().collect()
    }

    /// Topics of channels currently in the `Joined` state, for re-join
    /// after a reconnect.
    pub(crate) fn joined_topics(&self) -> Vec<String> {
        self.channels
            .lock()
            .unwrap()
            .values()
            .filter(|ch| ch.is_joined())
            .map(|ch| ch.topic().to_string())
            .collect()
    }

    /// Revert every channel to `Unjoined` (explicit disconnect).  Channels
    /// and their handlers stay registered.
    pub(crate) fn reset_join_states(&self) {
        for channel in self.channels.lock().unwrap().values() {
            channel.mark_unjoined();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}
