use serde::{Deserialize, Serialize};

/// Connection-level options for the realtime socket.
///
/// Controls heartbeat scheduling and the reconnection policy.  Separate
/// from per-channel concerns, which live on [`crate::channel::Channel`].
///
/// # Example
///
/// ```rust
/// use realtime_link::ConnectionOptions;
///
/// let options = ConnectionOptions::new()
///     .with_heartbeat_interval_ms(15_000)
///     .with_reconnect_delay_ms(500)
///     .with_max_reconnect_attempts(5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Interval between outbound heartbeat frames while connected.
    /// Default: 30000ms (30 seconds)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Base delay for the reconnection backoff; attempt *n* (1-indexed)
    /// waits `reconnect_delay_ms * 2^(n-1)`.
    /// Default: 1000ms (1 second)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Number of reconnection attempts before the client parks itself
    /// `Disconnected` permanently (a manual `connect()` resumes).
    /// Default: 10
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Timeout for establishing the socket (TCP + TLS + upgrade).
    /// Default: 10000ms (10 seconds)
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Budget for the best-effort leave frames sent during `disconnect()`.
    /// Default: 1000ms (1 second)
    #[serde(default = "default_leave_timeout_ms")]
    pub leave_timeout_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_leave_timeout_ms() -> u64 {
    1000
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connection_timeout_ms: default_connection_timeout_ms(),
            leave_timeout_ms: default_leave_timeout_ms(),
        }
    }
}

impl ConnectionOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heartbeat interval in milliseconds.  Set to `0` to disable
    /// heartbeats entirely.
    pub fn with_heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_interval_ms = ms;
        self
    }

    /// Set the base reconnection delay in milliseconds.
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    /// Set the maximum number of reconnection attempts.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the socket establishment timeout in milliseconds.
    pub fn with_connection_timeout_ms(mut self, ms: u64) -> Self {
        self.connection_timeout_ms = ms;
        self
    }

    /// Set the budget for best-effort leave frames on disconnect.
    pub fn with_leave_timeout_ms(mut self, ms: u64) -> Self {
        self.leave_timeout_ms = ms;
        self
    }
}
