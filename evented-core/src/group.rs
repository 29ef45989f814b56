//! Signal Groups
//!
//! A [`SignalGroup`] is the per-instance collection of signals, one per
//! tracked field, keyed by public signal name. Groups are built by a
//! [`SignalGroupFactory`], which the configured record type owns; given the
//! same descriptors it always yields the same names in the same order.
//!
//! Besides the field signals, every group has a relay, [`SignalGroup::all`],
//! that fires after any member signal emits.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ConfigurationError;
use crate::introspect::FieldDescriptor;
use crate::record::Field;
use crate::signal::{AnySignal, EmissionInfo, Signal, SignalRelay};

struct SignalEntry {
    field: &'static str,
    signal: Arc<dyn AnySignal>,
}

/// The signals of one record instance.
pub struct SignalGroup {
    owner: &'static str,
    signals: IndexMap<String, SignalEntry>,
    aliases: IndexMap<String, Option<String>>,
    all: SignalRelay,
}

impl SignalGroup {
    /// Name of the record type the group belongs to.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Public signal names in field declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    /// Look up a signal by public name without knowing its value type.
    pub fn get(&self, name: &str) -> Option<&dyn AnySignal> {
        self.signals.get(name).map(|entry| entry.signal.as_ref())
    }

    /// Look up a signal by public name.
    ///
    /// Returns `None` if no such signal exists or it carries another type.
    pub fn signal<T: 'static>(&self, name: &str) -> Option<&Signal<T>> {
        self.get(name)?.downcast_ref::<T>()
    }

    /// The signal tracking `field`, whatever its public name is.
    pub fn field<R, T: 'static>(&self, field: Field<R, T>) -> Option<&Signal<T>> {
        let public = self.aliases.get(field.name())?.as_deref()?;
        self.signal::<T>(public)
    }

    /// Field name to public signal name, `None` for fields left out.
    pub fn aliases(&self) -> &IndexMap<String, Option<String>> {
        &self.aliases
    }

    /// Relay that fires after any signal in the group emits.
    pub fn all(&self) -> &SignalRelay {
        &self.all
    }

    /// Block every signal in the group and the relay.
    pub fn block_all(&self) {
        for entry in self.signals.values() {
            entry.signal.block();
        }
        self.all.block();
    }

    pub fn unblock_all(&self) {
        for entry in self.signals.values() {
            entry.signal.unblock();
        }
        self.all.unblock();
    }

    /// Emit `public` and forward the emission to the relay.
    ///
    /// Returns whether the field signal delivered the emission.
    pub(crate) fn emit<T: 'static>(&self, public: &str, new: &T, old: &T) -> bool {
        let Some(entry) = self.signals.get(public) else {
            return false;
        };
        let Some(signal) = entry.signal.downcast_ref::<T>() else {
            return false;
        };
        if !signal.emit(new, old) {
            return false;
        }
        self.all.relay(&EmissionInfo::new(public, entry.field, new, old));
        true
    }
}

impl fmt::Debug for SignalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalGroup")
            .field("owner", &self.owner)
            .field("signals", &self.signals.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds signal groups from a fixed descriptor list.
#[derive(Clone)]
pub struct SignalGroupFactory {
    owner: &'static str,
    descriptors: Arc<[FieldDescriptor]>,
    aliases: IndexMap<String, Option<String>>,
}

impl SignalGroupFactory {
    pub(crate) fn new(
        owner: &'static str,
        descriptors: Arc<[FieldDescriptor]>,
        aliases: IndexMap<String, Option<String>>,
    ) -> Self {
        Self {
            owner,
            descriptors,
            aliases,
        }
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// Build a fresh group.
    ///
    /// Either every signal is constructed or the whole build fails; a
    /// partial group is never returned.
    pub fn build(&self) -> Result<SignalGroup, ConfigurationError> {
        let mut signals = IndexMap::with_capacity(self.descriptors.len());

        for descriptor in self.descriptors.iter() {
            let public = descriptor.public_name();
            let signal = descriptor.def().ops().new_signal();

            if signal.value_type() != descriptor.value_type() {
                return Err(ConfigurationError::SignalConstruction {
                    signal: public.to_string(),
                    reason: format!(
                        "payload type {} does not match field type {}",
                        signal.value_type(),
                        descriptor.value_type()
                    ),
                });
            }

            let entry = SignalEntry {
                field: descriptor.name(),
                signal,
            };
            if signals.insert(public.to_string(), entry).is_some() {
                return Err(ConfigurationError::SignalConstruction {
                    signal: public.to_string(),
                    reason: "name is already taken in this group".to_string(),
                });
            }
        }

        tracing::debug!(record = self.owner, signals = signals.len(), "built signal group");

        Ok(SignalGroup {
            owner: self.owner,
            signals,
            aliases: self.aliases.clone(),
            all: SignalRelay::new(),
        })
    }
}

impl fmt::Debug for SignalGroupFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalGroupFactory")
            .field("owner", &self.owner)
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventedConfig;
    use crate::introspect::introspect;
    use crate::naming::PrivateFields;
    use crate::record::{Record, RecordShape};
    use parking_lot::Mutex;

    struct Knob {
        label: String,
        _level: i32,
    }

    impl Knob {
        fn label() -> Field<Self, String> {
            Field::new("label", |k| &k.label, |k| &mut k.label)
        }

        fn level() -> Field<Self, i32> {
            Field::new("_level", |k| &k._level, |k| &mut k._level)
        }
    }

    impl Record for Knob {
        fn shape() -> RecordShape<Self> {
            RecordShape::mutable().field(Knob::label()).field(Knob::level())
        }
    }

    fn factory(config: &EventedConfig) -> SignalGroupFactory {
        let info = introspect::<Knob>(config).unwrap();
        SignalGroupFactory::new(
            info.type_name,
            info.descriptors.into(),
            info.names.aliases().clone(),
        )
    }

    #[test]
    fn build_is_deterministic() {
        let factory = factory(&EventedConfig::default());
        let a = factory.build().unwrap();
        let b = factory.build().unwrap();
        assert_eq!(a.names().collect::<Vec<_>>(), vec!["label", "_level"]);
        assert_eq!(a.names().collect::<Vec<_>>(), b.names().collect::<Vec<_>>());
        // Fresh signals every time.
        assert_ne!(a.get("label").unwrap().id(), b.get("label").unwrap().id());
    }

    #[test]
    fn typed_lookup_by_name_and_field() {
        let factory = factory(&EventedConfig::new().private_fields(PrivateFields::Strip));
        let group = factory.build().unwrap();
        assert!(group.signal::<i32>("level").is_some());
        assert!(group.signal::<String>("level").is_none());
        assert!(group.field(Knob::level()).is_some());
        assert_eq!(group.aliases().get("_level"), Some(&Some("level".to_string())));
    }

    #[test]
    fn emit_reaches_signal_then_relay() {
        let group = factory(&EventedConfig::default()).build().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        group.signal::<String>("label").unwrap().connect(move |new| {
            o.lock().push(format!("signal:{new}"));
        });
        let o = order.clone();
        group.all().connect(move |info| {
            o.lock().push(format!("all:{}", info.signal()));
        });

        assert!(group.emit("label", &"on".to_string(), &String::new()));
        assert_eq!(*order.lock(), vec!["signal:on", "all:label"]);
    }

    #[test]
    fn blocked_group_emits_nothing() {
        let group = factory(&EventedConfig::default()).build().unwrap();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        group.all().connect(move |_| *h.lock() += 1);

        group.block_all();
        assert!(!group.emit("_level", &1, &0));
        group.unblock_all();
        assert!(group.emit("_level", &1, &0));
        assert_eq!(*hits.lock(), 1);
    }
}
