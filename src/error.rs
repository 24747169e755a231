//! Error types for the realtime-link client library.

use thiserror::Error;

/// Errors produced by the realtime client.
///
/// Only caller-correctable precondition failures (missing token, bad URL,
/// bad builder configuration) are returned from public operations.  Errors
/// inside the receive/heartbeat machinery are logged and recovered locally
/// or handed to the reconnection policy; they never surface as panics and
/// never terminate the host runtime.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Connect was attempted without a usable access token.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The configured base URL could not be resolved to a socket URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An inbound frame did not match the wire contract.  Recovered locally:
    /// the frame is dropped and the receive loop continues.
    #[error("Frame decode error: {0}")]
    DecodeError(String),

    /// A WebSocket-level failure (handshake, send, unexpected close).
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// The client was built or used with invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An operation exceeded its configured time budget.
    #[error("Timeout: {0}")]
    TimeoutError(String),
}

/// Result type for realtime-link operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;
