//! The group-wide relay.
//!
//! Every signal group carries one [`SignalRelay`], exposed as `all`. After a
//! member signal delivers an emission, the relay fires with an
//! [`EmissionInfo`] naming the signal and carrying its payload type-erased.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::SubscriberId;

/// One emission as seen by the relay.
pub struct EmissionInfo<'a> {
    signal: &'a str,
    field: &'a str,
    new: &'a dyn Any,
    old: &'a dyn Any,
}

impl<'a> EmissionInfo<'a> {
    pub(crate) fn new<T: 'static>(signal: &'a str, field: &'a str, new: &'a T, old: &'a T) -> Self {
        Self {
            signal,
            field,
            new,
            old,
        }
    }

    /// Public name of the signal that emitted.
    pub fn signal(&self) -> &'a str {
        self.signal
    }

    /// Name of the record field that changed.
    pub fn field(&self) -> &'a str {
        self.field
    }

    /// The new value, if it has type `T`.
    pub fn new_value<T: 'static>(&self) -> Option<&'a T> {
        self.new.downcast_ref::<T>()
    }

    /// The replaced value, if it has type `T`.
    pub fn old_value<T: 'static>(&self) -> Option<&'a T> {
        self.old.downcast_ref::<T>()
    }
}

impl fmt::Debug for EmissionInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmissionInfo")
            .field("signal", &self.signal)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

type RelaySlot = Arc<dyn Fn(&EmissionInfo<'_>) + Send + Sync>;

/// Signal that fires for every emission in a group.
#[derive(Default)]
pub struct SignalRelay {
    slots: RwLock<Vec<(SubscriberId, RelaySlot)>>,
    blocked: AtomicBool,
}

impl SignalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a slot that sees every emission in the group.
    pub fn connect<F>(&self, slot: F) -> SubscriberId
    where
        F: Fn(&EmissionInfo<'_>) + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();
        self.slots.write().push((subscriber_id, Arc::new(slot)));
        subscriber_id
    }

    /// Remove a slot. Returns whether it was connected.
    pub fn disconnect(&self, subscriber_id: SubscriberId) -> bool {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|(id, _)| *id != subscriber_id);
        slots.len() != before
    }

    pub(crate) fn relay(&self, info: &EmissionInfo<'_>) {
        if self.is_blocked() {
            return;
        }
        let slots: SmallVec<[RelaySlot; 4]> = self
            .slots
            .read()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();
        for slot in slots {
            slot(info);
        }
    }

    pub fn block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn unblock(&self) {
        self.blocked.store(false, Ordering::SeqCst);
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.read().len()
    }
}

impl fmt::Debug for SignalRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRelay")
            .field("subscriber_count", &self.subscriber_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn relay_delivers_typed_payload() {
        let relay = SignalRelay::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        relay.connect(move |info| {
            let new = info.new_value::<i64>().copied();
            let old = info.old_value::<i64>().copied();
            seen_clone.lock().push((info.signal().to_string(), new, old));
        });

        relay.relay(&EmissionInfo::new("age", "age", &5i64, &0i64));
        assert_eq!(*seen.lock(), vec![("age".to_string(), Some(5), Some(0))]);
    }

    #[test]
    fn wrong_type_yields_none() {
        let (new, old) = ("x".to_string(), String::new());
        let info = EmissionInfo::new("name", "_name", &new, &old);
        assert!(info.new_value::<i64>().is_none());
        assert_eq!(info.field(), "_name");
    }

    #[test]
    fn blocked_relay_is_silent() {
        let relay = SignalRelay::new();
        let hits = Arc::new(Mutex::new(0));
        let hits_clone = hits.clone();
        let id = relay.connect(move |_| *hits_clone.lock() += 1);

        relay.block();
        relay.relay(&EmissionInfo::new("a", "a", &1u8, &0u8));
        assert_eq!(*hits.lock(), 0);

        relay.unblock();
        relay.relay(&EmissionInfo::new("a", "a", &1u8, &0u8));
        assert_eq!(*hits.lock(), 1);

        assert!(relay.disconnect(id));
        assert_eq!(relay.subscriber_count(), 0);
    }
}
