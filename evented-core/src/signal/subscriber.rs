//! Subscriber identifiers.
//!
//! Every slot connected to a signal or relay gets a [`SubscriberId`]. The id
//! is what callers keep to disconnect the slot later.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a connected slot.
///
/// Ids come from a process-wide counter, so an id never refers to slots on
/// two different signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}
