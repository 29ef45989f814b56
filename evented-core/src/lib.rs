//! Evented Core
//!
//! Per-field change notification for plain record types.
//!
//! A record type is configured once. From then on every instance exposes a
//! group of signals, one per tracked field, under a namespace (`events` by
//! default). Assigning a field through [`Evented::set`] compares the old and
//! new values and emits the field's signal only if they differ.
//!
//! # Architecture
//!
//! - `record`: how a struct describes its fields ([`Record`], [`Field`])
//! - `introspect`: resolves descriptors, names and equality operators
//! - `signal`: the [`Signal`] primitive and the group-wide relay
//! - `group`: per-instance [`SignalGroup`]s and the factory that builds them
//! - `cache`: where an instance keeps its group
//! - `evented`: configured types and the assignment interceptor
//! - `registry`: process-wide, configure-once installation
//!
//! # Example
//!
//! ```rust
//! use evented_core::{Evented, EventedConfig, EventedType, Field, Record, RecordShape};
//!
//! struct Person {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Person {
//!     fn name() -> Field<Self, String> {
//!         Field::new("name", |p| &p.name, |p| &mut p.name)
//!     }
//!
//!     fn age() -> Field<Self, i64> {
//!         Field::new("age", |p| &p.age, |p| &mut p.age)
//!     }
//! }
//!
//! impl Record for Person {
//!     fn shape() -> RecordShape<Self> {
//!         RecordShape::mutable().field(Person::name()).field(Person::age())
//!     }
//! }
//!
//! let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
//! let mut person = Evented::new(Person { name: "Ada".into(), age: 36 }, &ty);
//!
//! let events = person.events().unwrap();
//! events.signal::<i64>("age").unwrap().connect_with_old(|new, old| {
//!     println!("age: {old} -> {new}");
//! });
//!
//! person.set(Person::age(), 37).unwrap(); // prints "age: 36 -> 37"
//! person.set(Person::age(), 37).unwrap(); // no change, nothing printed
//! ```

pub mod cache;
pub mod config;
pub mod equality;
pub mod error;
pub mod evented;
pub mod group;
pub mod introspect;
pub mod naming;
pub mod record;
pub mod registry;
pub mod signal;

pub use cache::{CacheStrategy, GroupState, InstanceId};
pub use config::{EventedConfig, DEFAULT_NAMESPACE};
pub use equality::{array_equal, identity, structural, EqOperator, EqOperators};
pub use error::{ConfigWarning, ConfigurationError, EqualityError, SetError};
pub use evented::{Evented, EventedType};
pub use group::{SignalGroup, SignalGroupFactory};
pub use introspect::{introspect, EqSource, FieldDescriptor, Introspection};
pub use naming::{PrivateFields, SignalAliasFn};
pub use record::{Field, FieldDef, Record, RecordKind, RecordShape};
pub use registry::{install, installed, is_installed};
pub use signal::{AnySignal, EmissionInfo, Signal, SignalRelay, SubscriberId};
