//! Signal Implementation
//!
//! A Signal announces that one field changed. It holds no value itself:
//! the record keeps the value and hands it to the signal at emission time.
//!
//! # How Signals Work
//!
//! 1. Callers connect slots and keep the returned [`SubscriberId`].
//!
//! 2. When the field changes, the signal is emitted with the new value and
//!    the value it replaced.
//!
//! 3. Each connected slot runs once, in connection order.
//!
//! # Thread Safety
//!
//! The slot list sits behind a `parking_lot::RwLock`. The lock is released
//! before any slot runs.

use std::any::{type_name, Any};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::SubscriberId;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Slot<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// A change signal for values of type `T`.
///
/// # Example
///
/// ```rust
/// use evented_core::Signal;
///
/// let signal = Signal::<i64>::new();
/// let id = signal.connect(|new| println!("now {new}"));
///
/// signal.emit(&5, &0);
/// signal.disconnect(id);
/// ```
pub struct Signal<T: 'static> {
    /// Unique identifier for this signal.
    id: u64,

    /// Connected slots in connection order.
    slots: RwLock<Vec<(SubscriberId, Slot<T>)>>,

    /// While set, emissions are dropped.
    blocked: AtomicBool,
}

impl<T: 'static> Signal<T> {
    /// Create a signal with no slots.
    pub fn new() -> Self {
        Self {
            id: next_signal_id(),
            slots: RwLock::new(Vec::new()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Connect a slot that receives the new value.
    pub fn connect<F>(&self, slot: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.connect_with_old(move |new: &T, _old: &T| slot(new))
    }

    /// Connect a slot that receives the new value and the one it replaced.
    pub fn connect_with_old<F>(&self, slot: F) -> SubscriberId
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
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

    /// Whether a slot with this id is connected.
    pub fn is_connected(&self, subscriber_id: SubscriberId) -> bool {
        self.slots.read().iter().any(|(id, _)| *id == subscriber_id)
    }

    /// Remove every slot.
    pub fn disconnect_all(&self) {
        self.slots.write().clear();
    }

    /// Run every slot with `new` and `old`.
    ///
    /// Returns `false` without running anything while the signal is blocked.
    pub fn emit(&self, new: &T, old: &T) -> bool {
        if self.is_blocked() {
            tracing::trace!(signal = self.id, "emission dropped, signal blocked");
            return false;
        }

        // Snapshot so slots can reconnect without deadlocking on the lock.
        let slots: SmallVec<[Slot<T>; 4]> = self
            .slots
            .read()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();

        tracing::trace!(signal = self.id, slots = slots.len(), "emitting");
        for slot in slots {
            slot(new, old);
        }
        true
    }

    /// Stop delivering emissions until [`unblock`](Self::unblock).
    pub fn block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    /// Resume delivering emissions.
    pub fn unblock(&self) {
        self.blocked.store(false, Ordering::SeqCst);
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Get the number of connected slots.
    pub fn subscriber_count(&self) -> usize {
        self.slots.read().len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value_type", &type_name::<T>())
            .field("subscriber_count", &self.subscriber_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// A [`Signal`] with its value type erased.
///
/// Signal groups hold signals of different value types side by side; use
/// `downcast_ref` to get the typed signal back.
pub trait AnySignal: Send + Sync {
    fn id(&self) -> u64;

    /// Name of the value type the signal carries.
    fn value_type(&self) -> &'static str;

    fn subscriber_count(&self) -> usize;

    fn disconnect(&self, subscriber_id: SubscriberId) -> bool;

    fn block(&self);

    fn unblock(&self);

    fn is_blocked(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AnySignal for Signal<T> {
    fn id(&self) -> u64 {
        Signal::id(self)
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn subscriber_count(&self) -> usize {
        Signal::subscriber_count(self)
    }

    fn disconnect(&self, subscriber_id: SubscriberId) -> bool {
        Signal::disconnect(self, subscriber_id)
    }

    fn block(&self) {
        Signal::block(self)
    }

    fn unblock(&self) {
        Signal::unblock(self)
    }

    fn is_blocked(&self) -> bool {
        Signal::is_blocked(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AnySignal + '_ {
    /// Get the typed signal, if it carries values of type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&Signal<T>> {
        self.as_any().downcast_ref::<Signal<T>>()
    }
}

impl Debug for dyn AnySignal + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value_type", &self.value_type())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
