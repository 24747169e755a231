use std::fmt;

/// Join lifecycle of one channel.
///
/// Joins are optimistic: `subscribe()` flips straight to `Joined` when the
/// join frame is handed to the socket, without waiting for a server reply.
/// Only channels that were `Joined` immediately before a disconnection are
/// re-joined automatically after a successful reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Not subscribed; initial state, and the state every channel reverts to
    /// on explicit disconnect.
    Unjoined,
    /// A join frame is being prepared (transient).
    Joining,
    /// Subscribed; inbound change events for the topic are dispatched.
    Joined,
    /// A leave frame was sent; the channel is being removed.
    Leaving,
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unjoined => "unjoined",
            Self::Joining => "joining",
            Self::Joined => "joined",
            Self::Leaving => "leaving",
        };
        write!(f, "{}", name)
    }
}
