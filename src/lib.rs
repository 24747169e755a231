//! # realtime-link
//!
//! Async client for row-level change notifications over a single
//! multiplexed WebSocket connection.
//!
//! One socket carries many topic channels.  Subscribing to a topic such as
//! `table:orders` delivers typed insert/update/delete payloads to registered
//! handlers; the connection heals itself with exponential backoff and
//! re-joins subscribed channels after every reconnect.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use realtime_link::{RealtimeClient, RealtimeEvent};
//!
//! #[tokio::main]
//! async fn main() -> realtime_link::Result<()> {
//!     let client = RealtimeClient::builder()
//!         .url("https://db.example.com")
//!         .api_key("service-key")
//!         .access_token("jwt-token")
//!         .build()?;
//!
//!     client.connect().await?;
//!
//!     let users = client.channel("table:users");
//!     users.on(
//!         RealtimeEvent::All,
//!         Arc::new(|change| {
//!             println!("{} on {}: {:?}", change.event, change.table, change.record());
//!         }),
//!     );
//!     users.subscribe();
//!
//!     // ... handlers fire as changes arrive ...
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design notes
//!
//! - Sends are fire-and-forget: `subscribe()`/`unsubscribe()` never block on
//!   network I/O, and frames queued while the socket is down are dropped
//!   with a logged warning.
//! - Handlers run on the connection task; keep them short or hand work off
//!   to your own tasks.
//! - Delivery is best-effort: changes emitted while disconnected are not
//!   replayed.

pub mod channel;
pub mod client;
mod connection;
pub mod error;
pub mod event_hooks;
pub mod frame;
pub mod models;
mod refs;
mod registry;
mod router;
mod socket_url;

pub use channel::{Channel, ChangeHandler};
pub use client::{RealtimeClient, RealtimeClientBuilder};
pub use error::{RealtimeError, Result};
pub use event_hooks::{ConnectionError, DisconnectReason, OnConnectHook, OnDisconnectHook, OnErrorHook};
pub use frame::Frame;
pub use models::{ChangePayload, ConnectionOptions, ConnectionState, JoinState, RealtimeEvent};
pub use refs::RefGenerator;
