//! Evented Records
//!
//! [`EventedType`] is a record type after configuration: its descriptors,
//! naming table, cache strategy and, for the side-table strategy, the table
//! itself. [`Evented`] wraps one record instance of that type and routes
//! every assignment through [`Evented::set`].
//!
//! # Assignment
//!
//! For a tracked field, `set`:
//!
//! 1. compares the stored value with the new one using the field's operator,
//! 2. stores the new value, whether or not it differs,
//! 3. if it differs, fetches (creating on first use) the instance's signal
//!    group and emits the field's signal with the new and old values.
//!
//! If the comparison fails, nothing is stored and nothing is emitted.
//!
//! # Example
//!
//! ```rust
//! use evented_core::{Evented, EventedConfig, EventedType, Field, Record, RecordShape};
//!
//! struct Person {
//!     age: i64,
//! }
//!
//! impl Person {
//!     fn age() -> Field<Self, i64> {
//!         Field::new("age", |p| &p.age, |p| &mut p.age)
//!     }
//! }
//!
//! impl Record for Person {
//!     fn shape() -> RecordShape<Self> {
//!         RecordShape::mutable().field(Person::age())
//!     }
//! }
//!
//! let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
//! let mut person = Evented::new(Person { age: 0 }, &ty);
//!
//! person.events().unwrap().field(Person::age()).unwrap().connect(|age| {
//!     println!("age is now {age}");
//! });
//!
//! assert!(person.set(Person::age(), 5).unwrap());
//! assert!(!person.set(Person::age(), 5).unwrap());
//! ```

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cache::{CacheStrategy, GroupState, InstanceId, InstanceSlot, SideTable};
use crate::config::EventedConfig;
use crate::error::{ConfigWarning, ConfigurationError, SetError};
use crate::group::{SignalGroup, SignalGroupFactory};
use crate::introspect::{introspect, FieldDescriptor};
use crate::record::{Field, FieldDef, Record};
use crate::registry;

struct TypeState {
    type_name: &'static str,
    namespace: String,
    strategy: CacheStrategy,
    factory: SignalGroupFactory,
    /// Field name to index into the factory's descriptors.
    tracked: HashMap<&'static str, usize>,
    fields: Vec<FieldDef>,
    warnings: Vec<ConfigWarning>,
    side_table: SideTable,
}

/// A record type configured for change notification.
///
/// Cheap to clone; clones share the same configuration and side table.
pub struct EventedType<R: Record> {
    state: Arc<TypeState>,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> EventedType<R> {
    /// Introspect `R` and fix its configuration.
    ///
    /// Fails on any configuration mistake. Non-fatal findings are available
    /// from [`warnings`](Self::warnings).
    pub fn configure(config: &EventedConfig) -> Result<Self, ConfigurationError> {
        let info = introspect::<R>(config)?;

        let tracked = info
            .descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (descriptor.name(), index))
            .collect();
        let factory = SignalGroupFactory::new(
            info.type_name,
            info.descriptors.into(),
            info.names.aliases().clone(),
        );
        let strategy = config.cache_strategy();

        tracing::debug!(
            record = info.type_name,
            namespace = %config.namespace_name,
            strategy = ?strategy,
            "configured evented record"
        );

        Ok(Self {
            state: Arc::new(TypeState {
                type_name: info.type_name,
                namespace: config.namespace_name.clone(),
                strategy,
                factory,
                tracked,
                fields: info.fields,
                warnings: info.warnings,
                side_table: SideTable::default(),
            }),
            _record: std::marker::PhantomData,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.state.type_name
    }

    /// Name under which instances expose their signal group.
    pub fn namespace_name(&self) -> &str {
        &self.state.namespace
    }

    pub fn cache_strategy(&self) -> CacheStrategy {
        self.state.strategy
    }

    /// Non-fatal findings from configuration.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.state.warnings
    }

    /// Tracked fields in declaration order.
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        self.state.factory.descriptors()
    }

    /// Every declared field with its public signal name, `None` if untracked.
    pub fn aliases(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        self.state.fields.iter().map(|def| {
            let public = self.descriptor(def.name()).map(FieldDescriptor::public_name);
            (def.name(), public)
        })
    }

    /// Whether assignments to `field` are compared and signalled.
    pub fn is_tracked(&self, field: &str) -> bool {
        self.state.tracked.contains_key(field)
    }

    /// Number of groups currently held in the side table.
    pub fn side_table_len(&self) -> usize {
        self.state.side_table.len()
    }

    /// Wrap `record` as an instance of this type.
    pub fn wrap(&self, record: R) -> Evented<R> {
        Evented::new(record, self)
    }

    /// Whether both handles refer to the same configuration.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    fn descriptor(&self, field: &str) -> Option<&FieldDescriptor> {
        let index = *self.state.tracked.get(field)?;
        self.descriptors().get(index)
    }

    /// The declared field behind `field`, checked by name and value type.
    fn field_def<T: 'static>(
        &self,
        field: Field<R, T>,
        option: &'static str,
    ) -> Result<&FieldDef, ConfigurationError> {
        let def = self
            .state
            .fields
            .iter()
            .find(|def| def.name() == field.name())
            .ok_or_else(|| ConfigurationError::UnknownField {
                option,
                field: field.name().to_string(),
            })?;
        if def.type_id() != TypeId::of::<T>() {
            return Err(ConfigurationError::FieldTypeMismatch {
                field: field.name().to_string(),
                expected: def.value_type(),
                actual: type_name::<T>(),
            });
        }
        Ok(def)
    }
}

impl<R: Record> Clone for EventedType<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _record: std::marker::PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for EventedType<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventedType")
            .field("type_name", &self.state.type_name)
            .field("namespace", &self.state.namespace)
            .field("strategy", &self.state.strategy)
            .field("descriptors", &self.descriptors())
            .finish()
    }
}

/// Ties an instance id to its type, and clears the side-table entry when
/// the instance goes away.
struct Lease<R: Record> {
    id: InstanceId,
    ty: EventedType<R>,
}

impl<R: Record> Drop for Lease<R> {
    fn drop(&mut self) {
        if self.ty.state.strategy == CacheStrategy::SideTable {
            self.ty.state.side_table.remove(self.id);
        }
    }
}

/// One record instance with change notification.
pub struct Evented<R: Record> {
    record: R,
    slot: InstanceSlot,
    lease: Lease<R>,
}

impl<R: Record> Evented<R> {
    /// Wrap `record` as an instance of `ty`.
    pub fn new(record: R, ty: &EventedType<R>) -> Self {
        Self {
            record,
            slot: InstanceSlot::new(ty.cache_strategy()),
            lease: Lease {
                id: InstanceId::new(),
                ty: ty.clone(),
            },
        }
    }

    /// Wrap `record` using the configuration installed for `R`.
    pub fn installed(record: R) -> Result<Self, ConfigurationError> {
        let ty = registry::installed::<R>().ok_or(ConfigurationError::NotConfigured {
            type_name: type_name::<R>(),
        })?;
        Ok(Self::new(record, &ty))
    }

    pub fn id(&self) -> InstanceId {
        self.lease.id
    }

    pub fn evented_type(&self) -> &EventedType<R> {
        &self.lease.ty
    }

    /// Read-only access to the record.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// Unwrap the record, dropping the signal group.
    pub fn into_inner(self) -> R {
        self.record
    }

    /// Borrow a field's value.
    pub fn get<T>(&self, field: Field<R, T>) -> &T {
        field.get(&self.record)
    }

    /// Assign `value` to `field`.
    ///
    /// Returns whether the value changed; the field's signal is emitted
    /// exactly then. On a comparison error the old value stays in place.
    pub fn set<T: 'static>(&mut self, field: Field<R, T>, value: T) -> Result<bool, SetError> {
        let ty = self.lease.ty.clone();
        ty.field_def(field, "set")?;
        let Some(descriptor) = ty.descriptor(field.name()) else {
            *field.get_mut(&mut self.record) = value;
            return Ok(false);
        };

        let eq = descriptor.eq_operator().downcast::<T>().ok_or_else(|| {
            ConfigurationError::EqualityTypeMismatch {
                field: field.name().to_string(),
                expected: descriptor.eq_operator().value_type(),
                actual: type_name::<T>(),
            }
        })?;
        let changed = !eq.equal(field.get(&self.record), &value)?;

        let old = std::mem::replace(field.get_mut(&mut self.record), value);
        if !changed {
            return Ok(false);
        }

        let group = self.events()?;
        tracing::trace!(
            record = ty.type_name(),
            field = field.name(),
            signal = descriptor.public_name(),
            "field changed"
        );
        group.emit(descriptor.public_name(), field.get(&self.record), &old);
        Ok(true)
    }

    /// Assign the result of `f` applied to the current value.
    pub fn update<T: 'static, F>(&mut self, field: Field<R, T>, f: F) -> Result<bool, SetError>
    where
        F: FnOnce(&T) -> T,
    {
        let value = f(field.get(&self.record));
        self.set(field, value)
    }

    /// Assign the field's declared default.
    pub fn reset<T: Clone + 'static>(&mut self, field: Field<R, T>) -> Result<bool, SetError> {
        let default = self
            .lease
            .ty
            .field_def(field, "reset")?
            .default_value::<T>()
            .cloned()
            .ok_or_else(|| ConfigurationError::MissingDefault {
                field: field.name().to_string(),
            })?;
        self.set(field, default)
    }

    /// The instance's signal group, created on first access.
    ///
    /// Every call returns the same group.
    pub fn events(&self) -> Result<Arc<SignalGroup>, ConfigurationError> {
        let state = &self.lease.ty.state;
        self.slot
            .get_or_try_create(self.lease.id, &state.side_table, || {
                tracing::debug!(
                    record = state.type_name,
                    instance = self.lease.id.raw(),
                    "creating signal group"
                );
                state.factory.build()
            })
    }

    /// Look the signal group up by its configured namespace name.
    pub fn namespace(&self, name: &str) -> Result<Arc<SignalGroup>, ConfigurationError> {
        let ty = &self.lease.ty;
        if name != ty.namespace_name() {
            return Err(ConfigurationError::UnknownNamespace {
                type_name: ty.type_name(),
                expected: ty.namespace_name().to_string(),
                requested: name.to_string(),
            });
        }
        self.events()
    }

    /// Whether the signal group exists yet.
    pub fn group_state(&self) -> GroupState {
        self.slot.state(self.lease.id, &self.lease.ty.state.side_table)
    }
}

/// Compares records only; signal groups play no part in equality.
impl<R: Record + PartialEq> PartialEq for Evented<R> {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl<R: Record + Eq> Eq for Evented<R> {}

/// A clone is a new instance: same record value, no signal group yet.
impl<R: Record + Clone> Clone for Evented<R> {
    fn clone(&self) -> Self {
        Self::new(self.record.clone(), &self.lease.ty)
    }
}

impl<R: Record + fmt::Debug> fmt::Debug for Evented<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evented")
            .field("record", &self.record)
            .field("id", &self.lease.id)
            .field("group", &self.group_state())
            .finish()
    }
}

impl<R: Record + Serialize> Serialize for Evented<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

/// Deserializes the bare record and wraps it with the installed configuration.
impl<'de, R: Record + Deserialize<'de>> Deserialize<'de> for Evented<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = R::deserialize(deserializer)?;
        Evented::installed(record).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::EqOperator;
    use crate::error::EqualityError;
    use crate::naming::PrivateFields;
    use crate::record::RecordShape;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        name: String,
        age: i64,
        _secret: String,
    }

    impl Person {
        fn name() -> Field<Self, String> {
            Field::new("name", |p| &p.name, |p| &mut p.name)
        }

        fn age() -> Field<Self, i64> {
            Field::new("age", |p| &p.age, |p| &mut p.age)
        }

        fn secret() -> Field<Self, String> {
            Field::new("_secret", |p| &p._secret, |p| &mut p._secret)
        }

        fn sample() -> Self {
            Person {
                name: "Ada".into(),
                age: 0,
                _secret: "x".into(),
            }
        }
    }

    impl Record for Person {
        fn shape() -> RecordShape<Self> {
            RecordShape::mutable()
                .field(Person::name())
                .field_with_default(Person::age(), 0)
                .field(Person::secret())
        }
    }

    fn recorder<T: Clone + Send + Sync + 'static>(
        group: &SignalGroup,
        name: &str,
    ) -> Arc<Mutex<Vec<(T, T)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        group
            .signal::<T>(name)
            .unwrap()
            .connect_with_old(move |new, old| sink.lock().push((new.clone(), old.clone())));
        seen
    }

    #[test]
    fn set_emits_only_on_change() {
        let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
        let mut person = ty.wrap(Person::sample());
        let seen = recorder::<i64>(&person.events().unwrap(), "age");

        assert!(person.set(Person::age(), 5).unwrap());
        assert!(!person.set(Person::age(), 5).unwrap());
        assert_eq!(*seen.lock(), vec![(5, 0)]);
        assert_eq!(*person.get(Person::age()), 5);
    }

    #[test]
    fn first_change_creates_group() {
        for on_instance in [true, false] {
            let config = EventedConfig::new().cache_on_instance(on_instance);
            let ty = EventedType::<Person>::configure(&config).unwrap();
            let mut person = ty.wrap(Person::sample());

            assert_eq!(person.group_state(), GroupState::Uncreated);
            person.set(Person::age(), 0).unwrap();
            assert_eq!(person.group_state(), GroupState::Uncreated);
            person.set(Person::age(), 1).unwrap();
            assert_eq!(person.group_state(), GroupState::Created);
        }
    }

    #[test]
    fn events_identity_is_stable() {
        for on_instance in [true, false] {
            let config = EventedConfig::new().cache_on_instance(on_instance);
            let ty = EventedType::<Person>::configure(&config).unwrap();
            let person = ty.wrap(Person::sample());
            let a = person.events().unwrap();
            let b = person.namespace("events").unwrap();
            assert!(Arc::ptr_eq(&a, &b));
        }
    }

    #[test]
    fn side_table_entry_dies_with_instance() {
        let config = EventedConfig::new().cache_on_instance(false);
        let ty = EventedType::<Person>::configure(&config).unwrap();
        let person = ty.wrap(Person::sample());
        person.events().unwrap();
        assert_eq!(ty.side_table_len(), 1);
        drop(person);
        assert_eq!(ty.side_table_len(), 0);

        let person = ty.wrap(Person::sample());
        person.events().unwrap();
        let record = person.into_inner();
        assert_eq!(record.name, "Ada");
        assert_eq!(ty.side_table_len(), 0);
    }

    #[test]
    fn failing_operator_aborts_assignment() {
        let config = EventedConfig::new().eq_operator(
            "name",
            EqOperator::<String>::fallible(|_, _| Err(EqualityError::msg("cannot compare"))),
        );
        let ty = EventedType::<Person>::configure(&config).unwrap();
        let mut person = ty.wrap(Person::sample());
        let seen = recorder::<String>(&person.events().unwrap(), "name");

        let err = person.set(Person::name(), "Grace".into()).unwrap_err();
        assert!(matches!(err, SetError::Equality(_)));
        assert_eq!(err.to_string(), "cannot compare");
        assert_eq!(person.get(Person::name()), "Ada");
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn excluded_fields_store_without_signal() {
        let config = EventedConfig::new().private_fields(PrivateFields::Exclude);
        let ty = EventedType::<Person>::configure(&config).unwrap();
        assert!(!ty.is_tracked("_secret"));

        let mut person = ty.wrap(Person::sample());
        assert!(!person.set(Person::secret(), "y".into()).unwrap());
        assert_eq!(person.get(Person::secret()), "y");
        assert_eq!(person.group_state(), GroupState::Uncreated);
        assert!(!person.events().unwrap().contains("_secret"));
    }

    #[test]
    fn update_and_reset() {
        let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
        let mut person = ty.wrap(Person::sample());
        assert!(person.update(Person::age(), |age| age + 3).unwrap());
        assert_eq!(*person.get(Person::age()), 3);

        assert!(person.reset(Person::age()).unwrap());
        assert_eq!(*person.get(Person::age()), 0);

        let err = person.reset(Person::name()).unwrap_err();
        assert!(matches!(
            err,
            SetError::Configuration(ConfigurationError::MissingDefault { .. })
        ));
    }

    #[test]
    fn undeclared_handle_is_rejected_without_storing() {
        let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
        let mut person = ty.wrap(Person::sample());
        let misnamed: Field<Person, i64> = Field::new("agee", |p| &p.age, |p| &mut p.age);

        let err = person.set(misnamed, 5).unwrap_err();
        assert!(matches!(
            err,
            SetError::Configuration(ConfigurationError::UnknownField { option: "set", .. })
        ));
        assert_eq!(*person.get(Person::age()), 0);
        assert_eq!(person.group_state(), GroupState::Uncreated);
    }

    #[test]
    fn handle_with_wrong_type_is_rejected() {
        let config = EventedConfig::new().private_fields(PrivateFields::Exclude);
        let ty = EventedType::<Person>::configure(&config).unwrap();
        let mut person = ty.wrap(Person::sample());
        // Excluded field, but the handle claims a different value type.
        let retyped: Field<Person, i64> = Field::new("_secret", |p| &p.age, |p| &mut p.age);

        let err = person.set(retyped, 9).unwrap_err();
        assert!(matches!(
            err,
            SetError::Configuration(ConfigurationError::FieldTypeMismatch { .. })
        ));
        assert_eq!(*person.get(Person::age()), 0);
    }

    #[test]
    fn reset_reports_type_mismatch() {
        let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
        let mut person = ty.wrap(Person::sample());
        let retyped: Field<Person, String> = Field::new("age", |p| &p.name, |p| &mut p.name);

        let err = person.reset(retyped).unwrap_err();
        assert!(matches!(
            err,
            SetError::Configuration(ConfigurationError::FieldTypeMismatch {
                expected: "i64",
                ..
            })
        ));
        assert_eq!(person.get(Person::name()), "Ada");
    }

    #[test]
    fn wrong_namespace_is_rejected() {
        let config = EventedConfig::new().namespace("changes");
        let ty = EventedType::<Person>::configure(&config).unwrap();
        let person = ty.wrap(Person::sample());
        assert!(person.namespace("changes").is_ok());
        assert!(matches!(
            person.namespace("events"),
            Err(ConfigurationError::UnknownNamespace { .. })
        ));
    }

    #[test]
    fn equality_and_clone_ignore_groups() {
        let ty = EventedType::<Person>::configure(&EventedConfig::default()).unwrap();
        let person = ty.wrap(Person::sample());
        person.events().unwrap();

        let copy = person.clone();
        assert_eq!(person, copy);
        assert_ne!(person.id(), copy.id());
        assert_eq!(copy.group_state(), GroupState::Uncreated);
    }

    #[test]
    fn aliases_list_all_fields() {
        let config = EventedConfig::new()
            .private_fields(PrivateFields::Strip)
            .signal_suffix("_changed");
        let ty = EventedType::<Person>::configure(&config).unwrap();
        let table: Vec<_> = ty.aliases().collect();
        assert_eq!(
            table,
            vec![
                ("name", Some("name_changed")),
                ("age", Some("age_changed")),
                ("_secret", Some("secret_changed")),
            ]
        );
    }
}
