//! Signals
//!
//! The publish/subscribe primitives a signal group is made of.
//!
//! - [`Signal`] carries one field's value type. Slots receive the new value,
//!   and optionally the value it replaced.
//! - [`SignalRelay`] is the group-wide `all` signal. It fires after any
//!   member signal emits, with a type-erased [`EmissionInfo`].
//!
//! Emission is synchronous and runs on the assigning thread. Slot lists are
//! snapshotted before slots run, so a slot may connect or disconnect others
//! while an emission is in progress.

mod relay;
#[allow(clippy::module_inception)]
mod signal;
mod subscriber;

pub use relay::{EmissionInfo, SignalRelay};
pub use signal::{AnySignal, Signal};
pub use subscriber::SubscriberId;
