//! Per-connection message reference generator.
//!
//! Outbound control frames (join/leave/heartbeat) are tagged with a strictly
//! increasing reference for protocol symmetry.  The client does not correlate
//! replies to refs, but the sequence must stay unique and monotone within one
//! connection, and restarts from 1 on every successful (re)connect.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotone reference counter for one connection lifetime.
#[derive(Debug, Default)]
pub struct RefGenerator {
    counter: AtomicU64,
}

impl RefGenerator {
    /// Create a generator starting at zero (first `next()` returns `"1"`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next reference as its wire (decimal string) form.
    pub fn next(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        value.to_string()
    }

    /// Reset the sequence for a fresh connection.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    /// Current counter value (number of refs handed out since the last reset).
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refs_are_strictly_increasing() {
        let refs = RefGenerator::new();
        let values: Vec<u64> = (0..100)
            .map(|_| refs.next().parse::<u64>().unwrap())
            .collect();
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0], "refs must be strictly increasing");
        }
        assert_eq!(values[0], 1);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let refs = RefGenerator::new();
        assert_eq!(refs.next(), "1");
        assert_eq!(refs.next(), "2");
        refs.reset();
        assert_eq!(refs.next(), "1");
        assert_eq!(refs.current(), 1);
    }
}
