//! Signal naming.
//!
//! Each field's public signal name is resolved once, at configuration time,
//! into an immutable [`NameTable`]:
//!
//! 1. an explicit alias from `signal_aliases` is used verbatim (`None`
//!    removes the field from the group),
//! 2. otherwise a [`SignalAliasFn`], if configured, names the field, also
//!    verbatim,
//! 3. otherwise fields starting with [`PRIVATE_MARKER`] are handled by the
//!    [`PrivateFields`] switch,
//! 4. then the configured suffix is appended.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigurationError;

/// Leading character that marks a field as private.
pub const PRIVATE_MARKER: char = '_';

/// Names a signal group keeps for itself.
pub const RESERVED_SIGNAL_NAMES: &[&str] = &["all"];

/// What to do with fields whose name starts with [`PRIVATE_MARKER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivateFields {
    /// Use the raw name, marker included.
    #[default]
    PassThrough,

    /// Drop the leading markers: `_secret` is signalled as `secret`.
    Strip,

    /// Leave private fields out of the group entirely.
    Exclude,
}

impl PrivateFields {
    /// Map the tri-state flag form: `Some(true)` strips, `Some(false)`
    /// excludes, `None` passes names through.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => PrivateFields::Strip,
            Some(false) => PrivateFields::Exclude,
            None => PrivateFields::PassThrough,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum NamedPrivateFields {
    Passthrough,
    Strip,
    Exclude,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrivateFieldsRepr {
    Flag(Option<bool>),
    Named(NamedPrivateFields),
}

impl<'de> Deserialize<'de> for PrivateFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PrivateFieldsRepr::deserialize(deserializer)? {
            PrivateFieldsRepr::Flag(flag) => PrivateFields::from_flag(flag),
            PrivateFieldsRepr::Named(NamedPrivateFields::Passthrough) => PrivateFields::PassThrough,
            PrivateFieldsRepr::Named(NamedPrivateFields::Strip) => PrivateFields::Strip,
            PrivateFieldsRepr::Named(NamedPrivateFields::Exclude) => PrivateFields::Exclude,
        })
    }
}

/// Computes a field's signal name; `None` leaves the field out.
#[derive(Clone)]
pub struct SignalAliasFn(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>);

impl SignalAliasFn {
    pub fn new<F>(alias: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(alias))
    }

    pub fn alias(&self, field: &str) -> Option<String> {
        (self.0)(field)
    }
}

impl fmt::Debug for SignalAliasFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignalAliasFn")
    }
}

/// Pure mapping from field name to public signal name.
#[derive(Debug, Clone, Copy)]
pub struct NamingPolicy<'a> {
    pub private_fields: PrivateFields,
    pub suffix: &'a str,
    pub aliases: &'a IndexMap<String, Option<String>>,
    pub alias_fn: Option<&'a SignalAliasFn>,
}

impl NamingPolicy<'_> {
    /// Public signal name for `field`, or `None` if it gets no signal.
    pub fn public_name(&self, field: &str) -> Option<String> {
        if let Some(alias) = self.aliases.get(field) {
            return alias.clone();
        }
        if let Some(alias_fn) = self.alias_fn {
            return alias_fn.alias(field);
        }

        let base = if field.starts_with(PRIVATE_MARKER) {
            match self.private_fields {
                PrivateFields::PassThrough => field,
                PrivateFields::Strip => field.trim_start_matches(PRIVATE_MARKER),
                PrivateFields::Exclude => return None,
            }
        } else {
            field
        };

        Some(format!("{base}{}", self.suffix))
    }
}

/// Resolved field name to public signal name table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    entries: IndexMap<String, Option<String>>,
}

impl NameTable {
    /// Resolve every field through `policy`, rejecting empty, reserved and
    /// conflicting names.
    pub fn build<'f>(
        policy: &NamingPolicy<'_>,
        fields: impl IntoIterator<Item = &'f str>,
    ) -> Result<Self, ConfigurationError> {
        let mut entries = IndexMap::new();
        let mut owners: IndexMap<String, String> = IndexMap::new();

        for field in fields {
            let public = policy.public_name(field);
            if let Some(name) = &public {
                if name.is_empty() {
                    return Err(ConfigurationError::EmptySignalName {
                        field: field.to_string(),
                    });
                }
                if RESERVED_SIGNAL_NAMES.contains(&name.as_str()) {
                    return Err(ConfigurationError::ReservedSignalName {
                        signal: name.clone(),
                        field: field.to_string(),
                    });
                }
                if let Some(first) = owners.get(name) {
                    return Err(ConfigurationError::DuplicateSignalName {
                        signal: name.clone(),
                        first: first.clone(),
                        second: field.to_string(),
                    });
                }
                owners.insert(name.clone(), field.to_string());
            }
            entries.insert(field.to_string(), public);
        }

        Ok(Self { entries })
    }

    /// Public name of `field`; `None` if excluded or unknown.
    pub fn public_name(&self, field: &str) -> Option<&str> {
        self.entries.get(field)?.as_deref()
    }

    /// Whether `field` was resolved at all (tracked or excluded).
    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Every field with its public name, `None` for excluded ones.
    pub fn aliases(&self) -> &IndexMap<String, Option<String>> {
        &self.entries
    }

    /// Fields that receive a signal, with their public names.
    pub fn tracked(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(field, public)| Some((field.as_str(), public.as_deref()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy<'a>(
        private_fields: PrivateFields,
        suffix: &'a str,
        aliases: &'a IndexMap<String, Option<String>>,
    ) -> NamingPolicy<'a> {
        NamingPolicy {
            private_fields,
            suffix,
            aliases,
            alias_fn: None,
        }
    }

    #[test]
    fn pass_through_keeps_marker() {
        let aliases = IndexMap::new();
        let p = policy(PrivateFields::PassThrough, "", &aliases);
        assert_eq!(p.public_name("_secret").as_deref(), Some("_secret"));
        assert_eq!(p.public_name("name").as_deref(), Some("name"));
    }

    #[test]
    fn strip_then_suffix() {
        let aliases = IndexMap::new();
        let p = policy(PrivateFields::Strip, "_changed", &aliases);
        assert_eq!(p.public_name("_secret").as_deref(), Some("secret_changed"));
        assert_eq!(p.public_name("__dunder").as_deref(), Some("dunder_changed"));
        assert_eq!(p.public_name("age").as_deref(), Some("age_changed"));
    }

    #[test]
    fn exclude_drops_private_fields() {
        let aliases = IndexMap::new();
        let p = policy(PrivateFields::Exclude, "_changed", &aliases);
        assert_eq!(p.public_name("_secret"), None);
        assert_eq!(p.public_name("age").as_deref(), Some("age_changed"));
    }

    #[test]
    fn explicit_alias_wins_and_is_not_suffixed() {
        let mut aliases = IndexMap::new();
        aliases.insert("a".to_string(), Some("a_changed".to_string()));
        aliases.insert("_b".to_string(), None);
        let p = policy(PrivateFields::Strip, "_sfx", &aliases);
        assert_eq!(p.public_name("a").as_deref(), Some("a_changed"));
        assert_eq!(p.public_name("_b"), None);
    }

    #[test]
    fn alias_fn_names_fields_verbatim() {
        let mut aliases = IndexMap::new();
        aliases.insert("c".to_string(), Some("see".to_string()));
        let alias_fn = SignalAliasFn::new(|field| {
            (!field.starts_with(PRIVATE_MARKER)).then(|| format!("{field}_changed"))
        });
        let p = NamingPolicy {
            alias_fn: Some(&alias_fn),
            ..policy(PrivateFields::Strip, "_sfx", &aliases)
        };
        assert_eq!(p.public_name("a").as_deref(), Some("a_changed"));
        assert_eq!(p.public_name("_b"), None);
        assert_eq!(p.public_name("c").as_deref(), Some("see"));
    }

    #[test]
    fn table_rejects_conflicts() {
        let aliases = IndexMap::new();
        let p = policy(PrivateFields::Strip, "", &aliases);
        let err = NameTable::build(&p, ["age", "_age"]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateSignalName {
                signal: "age".into(),
                first: "age".into(),
                second: "_age".into(),
            }
        );
    }

    #[test]
    fn table_rejects_reserved_and_empty() {
        let aliases = IndexMap::new();
        let p = policy(PrivateFields::PassThrough, "", &aliases);
        assert!(matches!(
            NameTable::build(&p, ["all"]),
            Err(ConfigurationError::ReservedSignalName { .. })
        ));

        let p = policy(PrivateFields::Strip, "", &aliases);
        assert!(matches!(
            NameTable::build(&p, ["_"]),
            Err(ConfigurationError::EmptySignalName { .. })
        ));
    }

    #[test]
    fn table_keeps_excluded_fields_as_none() {
        let aliases = IndexMap::new();
        let p = policy(PrivateFields::Exclude, "", &aliases);
        let table = NameTable::build(&p, ["a", "_b"]).unwrap();
        assert_eq!(table.public_name("a"), Some("a"));
        assert_eq!(table.public_name("_b"), None);
        assert!(table.contains("_b"));
        assert_eq!(table.tracked().collect::<Vec<_>>(), vec![("a", "a")]);
        assert_eq!(table.aliases().len(), 2);
    }

    #[test]
    fn private_fields_deserialize_from_names_and_flags() {
        let parse = |s: &str| serde_json::from_str::<PrivateFields>(s).unwrap();
        assert_eq!(parse("\"strip\""), PrivateFields::Strip);
        assert_eq!(parse("\"exclude\""), PrivateFields::Exclude);
        assert_eq!(parse("\"passthrough\""), PrivateFields::PassThrough);
        assert_eq!(parse("true"), PrivateFields::Strip);
        assert_eq!(parse("false"), PrivateFields::Exclude);
        assert_eq!(parse("null"), PrivateFields::PassThrough);
    }
}
