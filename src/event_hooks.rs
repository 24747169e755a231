//! Connection lifecycle hooks.
//!
//! Callback-based hooks for monitoring the socket lifecycle:
//!
//! - `on_connect`: fired after the connection enters `Connected` (initial
//!   connect and every successful reconnect)
//! - `on_disconnect`: fired after the connection leaves `Connected` for any
//!   reason (explicit disconnect or network failure), and once more if the
//!   reconnection policy gives up
//! - `on_error`: fired on connection or protocol errors
//!
//! Hooks are registered at runtime on the client and invoked in
//! registration order from the connection task.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Reason for a disconnect event.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error information passed to the `on_error` hooks.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is recoverable (i.e. auto-reconnect may succeed).
    pub recoverable: bool,
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Type alias for on_connect callbacks.
pub type OnConnectHook = Arc<dyn Fn() + Send + Sync>;

/// Type alias for on_disconnect callbacks.
pub type OnDisconnectHook = Arc<dyn Fn(&DisconnectReason) + Send + Sync>;

/// Type alias for on_error callbacks.
pub type OnErrorHook = Arc<dyn Fn(&ConnectionError) + Send + Sync>;

/// Registered lifecycle hooks, shared between the public client handle and
/// the background connection task.
///
/// Lists are snapshotted before invocation so a hook may register further
/// hooks without deadlocking.
#[derive(Default)]
pub(crate) struct Hooks {
    on_connect: Mutex<Vec<OnConnectHook>>,
    on_disconnect: Mutex<Vec<OnDisconnectHook>>,
    on_error: Mutex<Vec<OnErrorHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.lock().unwrap().len())
            .field("on_disconnect", &self.on_disconnect.lock().unwrap().len())
            .field("on_error", &self.on_error.lock().unwrap().len())
            .finish()
    }
}

impl Hooks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_connect(&self, hook: OnConnectHook) {
        self.on_connect.lock().unwrap().push(hook);
    }

    pub(crate) fn add_disconnect(&self, hook: OnDisconnectHook) {
        self.on_disconnect.lock().unwrap().push(hook);
    }

    pub(crate) fn add_error(&self, hook: OnErrorHook) {
        self.on_error.lock().unwrap().push(hook);
    }

    /// Dispatch the on_connect hooks in registration order.
    pub(crate) fn emit_connect(&self) {
        let snapshot: Vec<OnConnectHook> = self.on_connect.lock().unwrap().clone();
        for hook in snapshot {
            hook();
        }
    }

    /// Dispatch the on_disconnect hooks in registration order.
    pub(crate) fn emit_disconnect(&self, reason: &DisconnectReason) {
        let snapshot: Vec<OnDisconnectHook> = self.on_disconnect.lock().unwrap().clone();
        for hook in snapshot {
            hook(reason);
        }
    }

    /// Dispatch the on_error hooks in registration order.
    pub(crate) fn emit_error(&self, error: &ConnectionError) {
        let snapshot: Vec<OnErrorHook> = self.on_error.lock().unwrap().clone();
        for hook in snapshot {
            hook(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_hooks_fire_in_registration_order() {
        let hooks = Hooks::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            hooks.add_connect(Arc::new(move || order.lock().unwrap().push(tag)));
        }

        hooks.emit_connect();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_disconnect_hook_receives_reason() {
        let hooks = Hooks::new();
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        hooks.add_disconnect(Arc::new(move |reason| {
            *seen_clone.lock().unwrap() = Some((reason.message.clone(), reason.code));
        }));

        hooks.emit_disconnect(&DisconnectReason::with_code("server closed", 1006));
        assert_eq!(
            *seen.lock().unwrap(),
            Some(("server closed".to_string(), Some(1006)))
        );
    }

    #[test]
    fn test_hook_may_register_more_hooks() {
        // A hook mutating the hook list mid-dispatch must not deadlock.
        let hooks = Arc::new(Hooks::new());
        let count = Arc::new(AtomicUsize::new(0));

        let hooks_clone = hooks.clone();
        let count_clone = count.clone();
        hooks.add_connect(Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
            hooks_clone.add_connect(Arc::new(|| {}));
        }));

        hooks.emit_connect();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
