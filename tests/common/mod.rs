//! In-process WebSocket mock server for integration tests.
//!
//! Accepts one connection at a time (a dropped connection frees the accept
//! loop for the client's reconnect), records every text frame the client
//! sends, and takes commands to push frames or kill the connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value as JsonValue;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

enum ServerCtl {
    /// Push a text frame to the current connection.
    Send(String),
    /// Close the current connection (the accept loop keeps running).
    Close,
}

pub struct MockServer {
    addr: SocketAddr,
    frames: Arc<Mutex<Vec<JsonValue>>>,
    connections: Arc<AtomicUsize>,
    ctl_tx: mpsc::UnboundedSender<ServerCtl>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames: Arc<Mutex<Vec<JsonValue>>> = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();

        let frames_task = frames.clone();
        let connections_task = connections.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                connections_task.fetch_add(1, Ordering::SeqCst);

                loop {
                    tokio::select! {
                        ctl = ctl_rx.recv() => match ctl {
                            Some(ServerCtl::Send(text)) => {
                                if ws.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            },
                            Some(ServerCtl::Close) => {
                                let _ = ws.close(None).await;
                                break;
                            },
                            None => return,
                        },
                        msg = ws.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(value) = serde_json::from_str(&text) {
                                    frames_task.lock().unwrap().push(value);
                                }
                            },
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {},
                            Some(Err(_)) => break,
                        },
                    }
                }
            }
        });

        Self {
            addr,
            frames,
            connections,
            ctl_tx,
            accept_task,
        }
    }

    /// Base URL for the client under test.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push a raw text frame to the connected client.
    pub fn send(&self, text: &str) {
        let _ = self.ctl_tx.send(ServerCtl::Send(text.to_string()));
    }

    /// Drop the current connection, simulating a network failure.
    pub fn kill_connection(&self) {
        let _ = self.ctl_tx.send(ServerCtl::Close);
    }

    /// Stop accepting entirely; subsequent reconnect attempts fail.
    pub fn stop(&self) {
        self.accept_task.abort();
    }

    /// How many WebSocket connections have been accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// All frames captured so far, decoded as JSON values.
    pub fn captured_frames(&self) -> Vec<JsonValue> {
        self.frames.lock().unwrap().clone()
    }

    /// Captured frames matching an event name, optionally filtered by topic.
    pub fn frames_for(&self, event: &str, topic: Option<&str>) -> Vec<JsonValue> {
        self.captured_frames()
            .into_iter()
            .filter(|frame| {
                let arr = match frame.as_array() {
                    Some(arr) if arr.len() == 5 => arr,
                    _ => return false,
                };
                arr[3].as_str() == Some(event)
                    && topic.map_or(true, |t| arr[2].as_str() == Some(t))
            })
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Poll a condition until it holds or a 5 second budget runs out.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
