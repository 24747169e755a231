//! Shared socket core and the background connection task.
//!
//! One task owns the WebSocket stream for the lifetime of a `connect()`
//! call, including every automatic reconnect.  The public API never touches
//! the stream: channels push frames into an unbounded outbound queue and the
//! task forwards them, so no caller-facing operation blocks on network I/O.
//!
//! The task cycles through two phases:
//!
//! - connected: a biased `select!` over control commands, the heartbeat
//!   deadline, the outbound queue, and the inbound stream
//! - reconnecting: exponential backoff between attempts, interruptible by
//!   shutdown, giving up for good after the configured attempt budget

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::channel::{EVENT_JOIN, EVENT_LEAVE};
use crate::error::{RealtimeError, Result};
use crate::event_hooks::{ConnectionError, DisconnectReason, Hooks};
use crate::frame;
use crate::models::{ConnectionOptions, ConnectionState};
use crate::refs::RefGenerator;
use crate::registry::ChannelRegistry;
use crate::router::{self, CONTROL_TOPIC};

/// Heartbeat event name, sent on the control topic.
pub(crate) const EVENT_HEARTBEAT: &str = "heartbeat";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands from the client handle to the background task.
pub(crate) enum CtlCmd {
    /// Graceful teardown; `ack` fires once the socket is closed and the
    /// state is `Disconnected`.
    Shutdown { ack: oneshot::Sender<()> },
}

/// State shared between the public client handle, its channels, and the
/// background task.
///
/// Every mutation is serialized through the individual locks; dispatch to
/// user callbacks always happens on snapshots taken outside them.
pub(crate) struct SocketCore {
    state: Mutex<ConnectionState>,
    pub(crate) attempts: AtomicU32,
    pub(crate) refs: RefGenerator,
    /// Sender half of the outbound queue; `None` whenever no socket is open.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pub(crate) registry: ChannelRegistry,
    pub(crate) hooks: Hooks,
    pub(crate) options: ConnectionOptions,
}

impl SocketCore {
    pub(crate) fn new(options: ConnectionOptions) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            refs: RefGenerator::new(),
            outbound: Mutex::new(None),
            registry: ChannelRegistry::new(),
            hooks: Hooks::new(),
            options,
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Set the state and return the previous value.
    pub(crate) fn swap_state(&self, state: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut *self.state.lock().unwrap(), state)
    }

    /// Transition `from` → `to` atomically; returns whether the transition
    /// applied.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Queue a frame for the background task, tagging it with the next ref.
    ///
    /// Fire-and-forget: when no socket is open the frame is dropped with a
    /// logged warning.
    pub(crate) fn push_frame(&self, topic: &str, event: &str, payload: JsonValue) {
        let text = frame::encode(&self.refs.next(), topic, event, payload);
        match self.outbound.lock().unwrap().as_ref() {
            Some(tx) => {
                if tx.send(text).is_err() {
                    log::warn!(
                        "[realtime-link] socket task stopped, '{}' frame for '{}' dropped",
                        event,
                        topic
                    );
                }
            },
            None => {
                log::warn!(
                    "[realtime-link] socket not open, '{}' frame for '{}' dropped",
                    event,
                    topic
                );
            },
        }
    }

    pub(crate) fn clear_socket(&self) {
        self.outbound.lock().unwrap().take();
    }
}

/// Outcome of the connected phase.
enum Driven {
    /// The socket failed underneath us; reconnect.
    Lost(DisconnectReason),
    /// Graceful shutdown requested.
    Shutdown(oneshot::Sender<()>),
    /// The client handle was dropped without an explicit disconnect.
    HandleGone,
}

/// Outcome of one reconnect attempt.
enum Revived {
    Socket(WsStream),
    Failed,
    GaveUp,
    Shutdown(oneshot::Sender<()>),
    HandleGone,
}

/// Background task owning the WebSocket for one `connect()` lifetime.
///
/// `ready_tx` resolves once the initial connection attempt settles; an
/// initial failure is handed to the reconnection policy rather than
/// terminating the task.
pub(crate) async fn connection_task(
    core: Arc<SocketCore>,
    url: String,
    mut ctl_rx: mpsc::UnboundedReceiver<CtlCmd>,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    let mut ws_stream: Option<WsStream> = None;
    let mut out_rx: Option<mpsc::UnboundedReceiver<String>> = None;

    match open_socket(&core.options, &url).await {
        Ok(mut ws) => {
            let rx = install_connected(&core);
            rejoin_joined(&core, &mut ws).await;
            ws_stream = Some(ws);
            out_rx = Some(rx);
            log::info!("[realtime-link] socket connected");
            core.hooks.emit_connect();
            let _ = ready_tx.send(Ok(()));
        },
        Err(e) => {
            log::warn!("[realtime-link] initial connection failed: {}", e);
            core.set_state(ConnectionState::Reconnecting);
            core.hooks
                .emit_error(&ConnectionError::new(format!("initial connection failed: {}", e), true));
            let _ = ready_tx.send(Err(e));
        },
    }

    loop {
        if let (Some(ws), Some(rx)) = (ws_stream.as_mut(), out_rx.as_mut()) {
            match drive_connected(&core, ws, rx, &mut ctl_rx).await {
                Driven::Lost(reason) => {
                    log::warn!("[realtime-link] connection lost: {}", reason);
                    ws_stream = None;
                    out_rx = None;
                    core.clear_socket();
                    core.set_state(ConnectionState::Reconnecting);
                    core.hooks.emit_disconnect(&reason);
                },
                Driven::Shutdown(ack) => {
                    graceful_shutdown(&core, ws_stream.take(), Some(ack)).await;
                    return;
                },
                Driven::HandleGone => {
                    graceful_shutdown(&core, ws_stream.take(), None).await;
                    return;
                },
            }
        } else {
            match await_reconnect(&core, &url, &mut ctl_rx).await {
                Revived::Socket(mut ws) => {
                    let rx = install_connected(&core);
                    rejoin_joined(&core, &mut ws).await;
                    ws_stream = Some(ws);
                    out_rx = Some(rx);
                    log::info!("[realtime-link] socket reconnected");
                    core.hooks.emit_connect();
                },
                Revived::Failed => {},
                Revived::GaveUp => {
                    log::error!(
                        "[realtime-link] giving up after {} reconnect attempt(s)",
                        core.options.max_reconnect_attempts
                    );
                    core.clear_socket();
                    core.set_state(ConnectionState::Disconnected);
                    core.hooks
                        .emit_disconnect(&DisconnectReason::new("max reconnect attempts exceeded"));
                    // Park until the handle disconnects or is dropped; a
                    // manual connect() spawns a fresh task.
                    loop {
                        match ctl_rx.recv().await {
                            Some(CtlCmd::Shutdown { ack }) => {
                                let _ = ack.send(());
                                return;
                            },
                            None => return,
                        }
                    }
                },
                Revived::Shutdown(ack) => {
                    graceful_shutdown(&core, None, Some(ack)).await;
                    return;
                },
                Revived::HandleGone => {
                    graceful_shutdown(&core, None, None).await;
                    return;
                },
            }
        }
    }
}

/// Steady-state loop while a socket is open.
async fn drive_connected(
    core: &Arc<SocketCore>,
    ws: &mut WsStream,
    out_rx: &mut mpsc::UnboundedReceiver<String>,
    ctl_rx: &mut mpsc::UnboundedReceiver<CtlCmd>,
) -> Driven {
    let heartbeat = Duration::from_millis(core.options.heartbeat_interval_ms);
    let has_heartbeat = !heartbeat.is_zero();
    let mut next_beat = Instant::now() + if has_heartbeat { heartbeat } else { Duration::ZERO };

    loop {
        tokio::select! {
            biased;

            cmd = ctl_rx.recv() => {
                return match cmd {
                    Some(CtlCmd::Shutdown { ack }) => Driven::Shutdown(ack),
                    None => Driven::HandleGone,
                };
            }

            _ = sleep_until(next_beat), if has_heartbeat => {
                let text = frame::encode(&core.refs.next(), CONTROL_TOPIC, EVENT_HEARTBEAT, json!({}));
                if let Err(e) = ws.send(Message::Text(text.into())).await {
                    return Driven::Lost(DisconnectReason::new(format!("heartbeat send failed: {}", e)));
                }
                log::trace!("[realtime-link] heartbeat sent");
                next_beat = Instant::now() + heartbeat;
            }

            queued = out_rx.recv() => {
                match queued {
                    Some(text) => {
                        if let Err(e) = ws.send(Message::Text(text.into())).await {
                            return Driven::Lost(DisconnectReason::new(format!("send failed: {}", e)));
                        }
                    },
                    // Unreachable while this socket is installed; treated as
                    // a loss to avoid spinning on a closed queue.
                    None => return Driven::Lost(DisconnectReason::new("outbound queue closed")),
                }
            }

            inbound = ws.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match frame::decode(&text) {
                            Ok(frame) => router::route_frame(core, &frame),
                            Err(e) => log::warn!("[realtime-link] dropping malformed frame: {}", e),
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws.send(Message::Pong(data)).await;
                    },
                    Some(Ok(Message::Close(close))) => {
                        let reason = match close {
                            Some(cf) => DisconnectReason::with_code(
                                format!("server closed connection: {}", cf.reason),
                                u16::from(cf.code),
                            ),
                            None => DisconnectReason::new("server closed connection"),
                        };
                        return Driven::Lost(reason);
                    },
                    Some(Ok(_)) => {}, // binary/pong frames are not part of the protocol
                    Some(Err(e)) => {
                        return Driven::Lost(DisconnectReason::new(format!("socket error: {}", e)));
                    },
                    None => return Driven::Lost(DisconnectReason::new("socket stream ended")),
                }
            }
        }
    }
}

/// One backoff-then-dial reconnect attempt, interruptible by shutdown.
async fn await_reconnect(
    core: &Arc<SocketCore>,
    url: &str,
    ctl_rx: &mut mpsc::UnboundedReceiver<CtlCmd>,
) -> Revived {
    let attempt = core.attempts.fetch_add(1, Ordering::SeqCst) + 1;
    if attempt > core.options.max_reconnect_attempts {
        return Revived::GaveUp;
    }

    let delay = reconnect_delay(core.options.reconnect_delay_ms, attempt);
    log::info!(
        "[realtime-link] reconnect attempt {}/{} in {:?}",
        attempt,
        core.options.max_reconnect_attempts,
        delay
    );

    tokio::select! {
        biased;
        cmd = ctl_rx.recv() => {
            return match cmd {
                Some(CtlCmd::Shutdown { ack }) => Revived::Shutdown(ack),
                None => Revived::HandleGone,
            };
        }
        _ = sleep(delay) => {}
    }

    match open_socket(&core.options, url).await {
        Ok(ws) => Revived::Socket(ws),
        Err(e) => {
            log::warn!("[realtime-link] reconnect attempt {} failed: {}", attempt, e);
            core.hooks.emit_error(&ConnectionError::new(
                format!("reconnect attempt {} failed: {}", attempt, e),
                true,
            ));
            Revived::Failed
        },
    }
}

/// Dial the socket within the configured connection timeout.
async fn open_socket(options: &ConnectionOptions, url: &str) -> Result<WsStream> {
    let budget = Duration::from_millis(options.connection_timeout_ms);
    let dial = connect_async(url);

    let outcome = if budget.is_zero() {
        Ok(dial.await)
    } else {
        timeout(budget, dial).await
    };

    match outcome {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(RealtimeError::WebSocketError(format!("connection failed: {}", e))),
        Err(_) => Err(RealtimeError::TimeoutError(format!(
            "connection not established within {:?}",
            budget
        ))),
    }
}

/// Reset per-connection bookkeeping and install a fresh outbound queue.
fn install_connected(core: &SocketCore) -> mpsc::UnboundedReceiver<String> {
    core.refs.reset();
    core.attempts.store(0, Ordering::SeqCst);
    let (tx, rx) = mpsc::unbounded_channel();
    *core.outbound.lock().unwrap() = Some(tx);
    core.set_state(ConnectionState::Connected);
    rx
}

/// Re-issue join frames for every channel that considers itself joined.
///
/// Runs before the connect hooks fire so a hook calling `subscribe()` on an
/// already-joined channel cannot produce a duplicate join.
async fn rejoin_joined(core: &SocketCore, ws: &mut WsStream) {
    let topics = core.registry.joined_topics();
    if topics.is_empty() {
        return;
    }
    log::info!("[realtime-link] re-joining {} channel(s)", topics.len());
    for topic in topics {
        let text = frame::encode(&core.refs.next(), &topic, EVENT_JOIN, json!({}));
        if let Err(e) = ws.send(Message::Text(text.into())).await {
            log::warn!("[realtime-link] re-join for '{}' failed: {}", topic, e);
            core.hooks.emit_error(&ConnectionError::new(
                format!("re-join for '{}' failed: {}", topic, e),
                true,
            ));
        }
    }
}

/// Best-effort leave frames, socket close, and final state bookkeeping.
async fn graceful_shutdown(core: &SocketCore, ws: Option<WsStream>, ack: Option<oneshot::Sender<()>>) {
    if let Some(mut ws) = ws {
        let budget = Duration::from_millis(core.options.leave_timeout_ms);
        if timeout(budget, send_leaves(core, &mut ws)).await.is_err() {
            log::debug!("[realtime-link] leave frames not flushed within {:?}", budget);
        }
        let _ = ws.close(None).await;
    }

    core.clear_socket();
    core.registry.reset_join_states();
    let previous = core.swap_state(ConnectionState::Disconnected);
    if previous == ConnectionState::Connected {
        core.hooks.emit_disconnect(&DisconnectReason::new("client disconnected"));
    }
    log::info!("[realtime-link] socket closed");

    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}

async fn send_leaves(core: &SocketCore, ws: &mut WsStream) {
    for topic in core.registry.joined_topics() {
        let text = frame::encode(&core.refs.next(), &topic, EVENT_LEAVE, json!({}));
        if let Err(e) = ws.send(Message::Text(text.into())).await {
            log::debug!("[realtime-link] leave for '{}' not sent: {}", topic, e);
            return;
        }
    }
    let _ = ws.flush().await;
}

/// Backoff delay for a 1-indexed attempt: `base * 2^(attempt-1)`.
fn reconnect_delay(base_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(exponent)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_doubles_per_attempt() {
        let delays: Vec<u64> =
            (1..=5).map(|n| reconnect_delay(1000, n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000]);
    }

    #[test]
    fn test_reconnect_delay_saturates() {
        // Pathological attempt numbers must not overflow
        let delay = reconnect_delay(1000, 200);
        assert_eq!(delay, Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_state_transition_is_conditional() {
        let core = SocketCore::new(ConnectionOptions::default());
        assert!(core.transition(ConnectionState::Disconnected, ConnectionState::Connecting));
        assert_eq!(core.state(), ConnectionState::Connecting);
        assert!(!core.transition(ConnectionState::Disconnected, ConnectionState::Connecting));
    }

    #[test]
    fn test_push_frame_without_socket_is_dropped_quietly() {
        let core = SocketCore::new(ConnectionOptions::default());
        // Must not panic or block
        core.push_frame("table:users", "phx_join", json!({}));
    }

    #[tokio::test]
    async fn test_push_frame_tags_with_monotone_refs() {
        let core = SocketCore::new(ConnectionOptions::default());
        let mut rx = install_connected(&core);

        core.push_frame("table:users", "phx_join", json!({}));
        core.push_frame("table:orders", "phx_join", json!({}));

        let first = frame::decode(&rx.recv().await.unwrap()).unwrap();
        let second = frame::decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first.frame_ref, "1");
        assert_eq!(second.frame_ref, "2");
        assert_eq!(first.topic, "table:users");
    }

    #[test]
    fn test_install_connected_resets_bookkeeping() {
        let core = SocketCore::new(ConnectionOptions::default());
        core.attempts.store(7, Ordering::SeqCst);
        core.refs.next();
        core.refs.next();

        let _rx = install_connected(&core);
        assert_eq!(core.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(core.state(), ConnectionState::Connected);
        assert_eq!(core.refs.next(), "1", "refs restart per connection");
    }
}
