//! Field introspection.
//!
//! Turns a record's self-description plus an [`EventedConfig`] into the
//! ordered list of [`FieldDescriptor`]s the rest of the crate works from.
//! Every configuration mistake is reported here, before any instance exists.

use std::collections::HashSet;
use std::fmt;

use crate::config::EventedConfig;
use crate::equality::{EqOperators, ErasedEq};
use crate::error::{ConfigWarning, ConfigurationError};
use crate::naming::NameTable;
use crate::record::{FieldDef, Record, RecordKind};

/// Where a field's equality operator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqSource {
    /// Passed in the configuration.
    Explicit,
    /// Declared by the record type.
    Declared,
    /// The default that came with the field declaration.
    Default,
}

/// Resolved metadata for one tracked field.
#[derive(Clone)]
pub struct FieldDescriptor {
    def: FieldDef,
    public_name: String,
    eq: ErasedEq,
    eq_source: EqSource,
}

impl FieldDescriptor {
    /// The field's declared name.
    pub fn name(&self) -> &'static str {
        self.def.name()
    }

    /// Name the field's signal is addressed by.
    pub fn public_name(&self) -> &str {
        &self.public_name
    }

    pub fn value_type(&self) -> &'static str {
        self.def.value_type()
    }

    pub fn eq_source(&self) -> EqSource {
        self.eq_source
    }

    pub(crate) fn def(&self) -> &FieldDef {
        &self.def
    }

    pub(crate) fn eq_operator(&self) -> &ErasedEq {
        &self.eq
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name())
            .field("public_name", &self.public_name)
            .field("value_type", &self.value_type())
            .field("eq_source", &self.eq_source)
            .finish()
    }
}

/// Result of introspecting one record type.
#[derive(Debug, Clone)]
pub struct Introspection {
    pub type_name: &'static str,
    /// Tracked fields in declaration order.
    pub descriptors: Vec<FieldDescriptor>,
    /// Every declared field, excluded ones mapped to `None`.
    pub names: NameTable,
    /// All declared fields, tracked or not.
    pub fields: Vec<FieldDef>,
    pub warnings: Vec<ConfigWarning>,
}

/// Describe `R` under `config`.
pub fn introspect<R: Record>(config: &EventedConfig) -> Result<Introspection, ConfigurationError> {
    let shape = R::shape();
    let type_name = shape.type_name();

    match shape.kind() {
        RecordKind::Mutable => {}
        RecordKind::Frozen => return Err(ConfigurationError::FrozenRecord { type_name }),
        RecordKind::Opaque => return Err(ConfigurationError::NotARecord { type_name }),
    }

    let fields = shape.fields().to_vec();
    let mut seen = HashSet::new();
    for def in &fields {
        if !seen.insert(def.name()) {
            return Err(ConfigurationError::DuplicateField {
                type_name,
                field: def.name().to_string(),
            });
        }
    }

    let declared = R::eq_operators();
    check_known(&seen, config.equality_operators.fields(), "equality_operators")?;
    check_known(&seen, declared.fields(), "Record::eq_operators")?;
    check_known(
        &seen,
        config.signal_aliases.keys().map(String::as_str),
        "signal_aliases",
    )?;
    check_namespace(&config.namespace_name, &seen, type_name)?;

    let names = NameTable::build(&config.naming_policy(), fields.iter().map(FieldDef::name))?;

    let mut descriptors = Vec::with_capacity(fields.len());
    for def in &fields {
        let Some(public_name) = names.public_name(def.name()) else {
            continue;
        };
        let (eq, eq_source) = resolve_eq(def, &config.equality_operators, &declared)?;
        descriptors.push(FieldDescriptor {
            def: def.clone(),
            public_name: public_name.to_string(),
            eq,
            eq_source,
        });
    }

    let mut warnings = Vec::new();
    if descriptors.is_empty() && config.warn_on_no_fields {
        let warning = ConfigWarning::NoFields { type_name };
        tracing::warn!(record = type_name, "{warning}");
        warnings.push(warning);
    }

    tracing::debug!(
        record = type_name,
        fields = fields.len(),
        tracked = descriptors.len(),
        "introspected record"
    );

    Ok(Introspection {
        type_name,
        descriptors,
        names,
        fields,
        warnings,
    })
}

fn check_known<'a>(
    fields: &HashSet<&'static str>,
    names: impl IntoIterator<Item = &'a str>,
    option: &'static str,
) -> Result<(), ConfigurationError> {
    for name in names {
        if !fields.contains(name) {
            return Err(ConfigurationError::UnknownField {
                option,
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

fn check_namespace(
    namespace: &str,
    fields: &HashSet<&'static str>,
    type_name: &'static str,
) -> Result<(), ConfigurationError> {
    let mut chars = namespace.chars();
    let valid = matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric());
    if !valid {
        return Err(ConfigurationError::InvalidNamespace {
            namespace: namespace.to_string(),
        });
    }
    if fields.contains(namespace) {
        return Err(ConfigurationError::NamespaceCollision {
            namespace: namespace.to_string(),
            type_name,
        });
    }
    Ok(())
}

fn resolve_eq(
    def: &FieldDef,
    explicit: &EqOperators,
    declared: &EqOperators,
) -> Result<(ErasedEq, EqSource), ConfigurationError> {
    let (eq, source) = if let Some(op) = explicit.get(def.name()) {
        (op.clone(), EqSource::Explicit)
    } else if let Some(op) = declared.get(def.name()) {
        (op.clone(), EqSource::Declared)
    } else if let Some(op) = def.default_eq() {
        (op.clone(), EqSource::Default)
    } else {
        return Err(ConfigurationError::MissingEqualityOperator {
            field: def.name().to_string(),
        });
    };

    if eq.type_id() != def.type_id() {
        return Err(ConfigurationError::EqualityTypeMismatch {
            field: def.name().to_string(),
            expected: eq.value_type(),
            actual: def.value_type(),
        });
    }
    Ok((eq, source))
}
