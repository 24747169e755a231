//! Public client handle.
//!
//! `RealtimeClient` is the caller-facing entry point: it owns the shared
//! socket core, spawns the background connection task on `connect()`, and
//! hands out channels.  The handle is cheap to share behind an `Arc` and
//! every method takes `&self`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use realtime_link::{RealtimeClient, RealtimeEvent};
//!
//! # async fn run() -> realtime_link::Result<()> {
//! let client = RealtimeClient::builder()
//!     .url("https://db.example.com")
//!     .api_key("service-key")
//!     .access_token("jwt-token")
//!     .build()?;
//!
//! client.connect().await?;
//!
//! let orders = client.channel("table:orders");
//! orders.on(
//!     RealtimeEvent::Insert,
//!     Arc::new(|change| println!("new order: {:?}", change.record())),
//! );
//! orders.subscribe();
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::channel::Channel;
use crate::connection::{connection_task, CtlCmd, SocketCore};
use crate::error::{RealtimeError, Result};
use crate::event_hooks::{OnConnectHook, OnDisconnectHook, OnErrorHook};
use crate::models::{ConnectionOptions, ConnectionState};
use crate::socket_url::resolve_socket_url;

/// Extra grace on top of the leave budget when awaiting the shutdown ack.
const SHUTDOWN_ACK_GRACE_MS: u64 = 5000;

/// Builder for [`RealtimeClient`].
#[derive(Debug, Default)]
pub struct RealtimeClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
    options: ConnectionOptions,
}

impl RealtimeClientBuilder {
    /// Base URL of the server (`http(s)` or `ws(s)` scheme).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// API key, sent as the `X-API-Key` query parameter.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Access token, sent as the `token` query parameter.  Required before
    /// `connect()`; may also be supplied later via
    /// [`RealtimeClient::set_auth`].
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Connection options (heartbeat, reconnect policy, timeouts).
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the client.  Fails if the URL or API key is missing.
    pub fn build(self) -> Result<RealtimeClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| RealtimeError::ConfigurationError("base URL is required".to_string()))?;
        let api_key = self
            .api_key
            .ok_or_else(|| RealtimeError::ConfigurationError("API key is required".to_string()))?;

        Ok(RealtimeClient {
            core: SocketCore::new(self.options),
            base_url,
            api_key,
            access_token: Mutex::new(self.access_token),
            ctl: Mutex::new(None),
            task: Mutex::new(None),
        })
    }
}

/// A WebSocket client delivering row-level change notifications over
/// multiplexed topic channels.
pub struct RealtimeClient {
    core: Arc<SocketCore>,
    base_url: String,
    api_key: String,
    access_token: Mutex<Option<String>>,
    /// Command channel to the current background task, if one is running.
    ctl: Mutex<Option<mpsc::UnboundedSender<CtlCmd>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClient {
    /// Start building a client.
    pub fn builder() -> RealtimeClientBuilder {
        RealtimeClientBuilder::default()
    }

    /// Open the connection.
    ///
    /// No-op (logged) unless the client is `Disconnected`.  Fails with
    /// [`RealtimeError::AuthenticationError`] when no access token is set and
    /// [`RealtimeError::InvalidUrl`] when the base URL cannot be resolved; in
    /// both cases the client stays `Disconnected`.
    ///
    /// Returns once the initial connection attempt settles.  An initial
    /// socket failure is not an error here: the background task keeps
    /// retrying under the reconnect policy and failures surface through the
    /// `on_error`/`on_disconnect` hooks.
    pub async fn connect(&self) -> Result<()> {
        if !self
            .core
            .transition(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            log::info!("[realtime-link] connect() ignored: state is {}", self.core.state());
            return Ok(());
        }

        let token = self.access_token.lock().unwrap().clone();
        let token = match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => token,
            None => {
                self.core.set_state(ConnectionState::Disconnected);
                return Err(RealtimeError::AuthenticationError(
                    "access token is required to connect".to_string(),
                ));
            },
        };

        let url = match resolve_socket_url(&self.base_url, &self.api_key, Some(&token)) {
            Ok(url) => url,
            Err(e) => {
                self.core.set_state(ConnectionState::Disconnected);
                return Err(e);
            },
        };

        self.core.attempts.store(0, Ordering::SeqCst);

        let (ctl_tx, ctl_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        // Replacing the slot drops any previous sender, which releases a
        // task parked after exhausting its reconnect attempts.
        *self.ctl.lock().unwrap() = Some(ctl_tx);
        let handle = tokio::spawn(connection_task(self.core.clone(), url, ctl_rx, ready_tx));
        *self.task.lock().unwrap() = Some(handle);

        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                // The task is already retrying under the reconnect policy.
                log::warn!("[realtime-link] initial attempt failed, reconnecting: {}", e);
                Ok(())
            },
            Err(_) => {
                self.core.set_state(ConnectionState::Disconnected);
                Err(RealtimeError::WebSocketError(
                    "connection task terminated before becoming ready".to_string(),
                ))
            },
        }
    }

    /// Close the connection.
    ///
    /// Forces the reconnect attempt counter to its cap so no reconnection
    /// races the teardown, asks the task to send best-effort leave frames and
    /// close the socket, and waits for its acknowledgement.  Channels revert
    /// to `Unjoined` but stay registered with their handlers; no dispatch
    /// occurs after this returns.
    pub async fn disconnect(&self) -> Result<()> {
        self.core
            .attempts
            .store(self.core.options.max_reconnect_attempts, Ordering::SeqCst);

        let ctl = self.ctl.lock().unwrap().take();
        let Some(ctl) = ctl else {
            self.settle_disconnected();
            return Ok(());
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if ctl.send(CtlCmd::Shutdown { ack: ack_tx }).is_err() {
            self.settle_disconnected();
            return Ok(());
        }

        let budget =
            Duration::from_millis(self.core.options.leave_timeout_ms + SHUTDOWN_ACK_GRACE_MS);
        match timeout(budget, ack_rx).await {
            Ok(Ok(())) => {},
            Ok(Err(_)) => {
                // Task exited without acking
                self.settle_disconnected();
            },
            Err(_) => {
                log::warn!("[realtime-link] shutdown ack not received within {:?}", budget);
                self.settle_disconnected();
            },
        }

        if let Some(handle) = self.task.lock().unwrap().take() {
            drop(handle); // task exits on its own after acking
        }
        Ok(())
    }

    /// Get (or create) the channel for `topic`.  Repeated calls with one
    /// topic return the same instance until the channel unsubscribes.
    pub fn channel(&self, topic: &str) -> Arc<Channel> {
        self.core.registry.get_or_create(topic, Arc::downgrade(&self.core))
    }

    /// Topics of all currently registered channels.
    pub fn channels(&self) -> Vec<String> {
        self.core.registry.topics()
    }

    /// Unsubscribe and drop every registered channel.
    pub fn remove_all_channels(&self) {
        for channel in self.core.registry.clear() {
            channel.unsubscribe();
        }
    }

    /// Replace the access token used by the next `connect()`.
    ///
    /// Does not affect an already-established connection; reconnects started
    /// by the current task keep the URL they were spawned with.
    pub fn set_auth(&self, token: impl Into<String>) {
        *self.access_token.lock().unwrap() = Some(token.into());
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.core.state()
    }

    /// Whether the connection is currently `Connected`.
    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Register a callback fired after every successful (re)connect.
    pub fn on_connect(&self, hook: OnConnectHook) {
        self.core.hooks.add_connect(hook);
    }

    /// Register a callback fired when the connection is lost or closed.
    pub fn on_disconnect(&self, hook: OnDisconnectHook) {
        self.core.hooks.add_disconnect(hook);
    }

    /// Register a callback fired on connection and protocol errors.
    pub fn on_error(&self, hook: OnErrorHook) {
        self.core.hooks.add_error(hook);
    }

    /// State bookkeeping when the task is gone or unresponsive.
    fn settle_disconnected(&self) {
        self.core.clear_socket();
        self.core.registry.reset_join_states();
        self.core.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        // Best effort: wake the task so it closes the socket. The ack is
        // intentionally not awaited.
        if let Some(ctl) = self.ctl.lock().unwrap().take() {
            let (ack, _) = oneshot::channel();
            let _ = ctl.send(CtlCmd::Shutdown { ack });
        }
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("base_url", &self.base_url)
            .field("state", &self.core.state())
            .field("channels", &self.core.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RealtimeClient {
        RealtimeClient::builder()
            .url("http://localhost:4000")
            .api_key("key")
            .access_token("token")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_url_and_api_key() {
        assert!(matches!(
            RealtimeClient::builder().api_key("k").build(),
            Err(RealtimeError::ConfigurationError(_))
        ));
        assert!(matches!(
            RealtimeClient::builder().url("http://x").build(),
            Err(RealtimeError::ConfigurationError(_))
        ));
        assert!(RealtimeClient::builder().url("http://x").api_key("k").build().is_ok());
    }

    #[tokio::test]
    async fn test_connect_without_token_fails_and_stays_disconnected() {
        let client = RealtimeClient::builder()
            .url("http://localhost:4000")
            .api_key("key")
            .build()
            .unwrap();

        let result = client.connect().await;
        assert!(matches!(result, Err(RealtimeError::AuthenticationError(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_with_blank_token_fails() {
        let client = client();
        client.set_auth("   ");
        assert!(matches!(
            client.connect().await,
            Err(RealtimeError::AuthenticationError(_))
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_with_invalid_url_fails_and_stays_disconnected() {
        let client = RealtimeClient::builder()
            .url("ftp://nope")
            .api_key("key")
            .access_token("token")
            .build()
            .unwrap();

        assert!(matches!(client.connect().await, Err(RealtimeError::InvalidUrl(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_a_noop() {
        let client = client();
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_channel_identity_and_listing() {
        let client = client();
        let a = client.channel("table:users");
        let b = client.channel("table:users");
        assert!(Arc::ptr_eq(&a, &b));

        client.channel("table:orders");
        let mut topics = client.channels();
        topics.sort();
        assert_eq!(topics, vec!["table:orders", "table:users"]);

        client.remove_all_channels();
        assert!(client.channels().is_empty());
    }
}
