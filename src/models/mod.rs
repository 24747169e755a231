//! Data models for the realtime-link client library.
//!
//! Defines the connection/channel state enums, the typed change payload
//! delivered to handlers, and connection-level options.

pub mod change_payload;
pub mod connection_options;
pub mod connection_state;
pub mod join_state;
pub mod realtime_event;


pub use change_payload::ChangePayload;
pub use connection_options::ConnectionOptions;
pub use connection_state::ConnectionState;
pub use join_state::JoinState;
pub use realtime_event::RealtimeEvent;
