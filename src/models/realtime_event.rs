use std::fmt;

/// Kind of row-level change a handler can be registered for.
///
/// `Insert`/`Update`/`Delete` form the closed set of change events the
/// server transmits.  `All` is a synthetic wildcard matcher used only for
/// handler registration and never appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeEvent {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
    /// Wildcard matcher: handler fires for every change event.
    All,
}

impl RealtimeEvent {
    /// Map a wire-level event name onto the closed change set.
    ///
    /// Matching is case-insensitive.  Returns `None` for anything outside
    /// `{insert, update, delete}`; in particular `All` is never produced
    /// from wire input.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Canonical (uppercase) name of this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::All => "*",
        }
    }
}

impl fmt::Display for RealtimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
