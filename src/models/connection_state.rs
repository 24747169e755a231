use std::fmt;

/// Lifecycle state of the single physical connection.
///
/// Owned by the client's shared core; transitions happen only through the
/// connection state machine (connect, socket open, unexpected close,
/// reconnect policy, disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; initial state and terminal state after `disconnect()` or
    /// an exhausted reconnection policy.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The socket is open; heartbeats and dispatch are active.
    Connected,
    /// The socket dropped unexpectedly; the backoff policy is running.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        write!(f, "{}", name)
    }
}
