//! Configuration applied once per record type.
//!
//! | option                 | default        |
//! |------------------------|----------------|
//! | `namespace_name`       | `"events"`     |
//! | `equality_operators`   | empty          |
//! | `warn_on_no_fields`    | `true`         |
//! | `cache_on_instance`    | `true`         |
//! | `alias_private_fields` | pass-through   |
//! | `signal_suffix`        | `""`           |
//! | `signal_aliases`       | empty          |
//! | `signal_alias_fn`      | none           |
//!
//! Everything except the equality operators and the alias function can be
//! loaded from JSON with [`EventedConfig::from_json`]; those are code and are
//! added with [`EventedConfig::eq_operator`] and
//! [`EventedConfig::signal_alias_fn`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStrategy;
use crate::equality::{EqOperator, EqOperators};
use crate::error::ConfigurationError;
use crate::naming::{NamingPolicy, PrivateFields, SignalAliasFn};

/// Namespace the signal group is exposed under unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "events";

/// Options for turning a record type into an evented one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventedConfig {
    /// Name under which instances expose their signal group.
    pub namespace_name: String,

    /// Per-field equality overrides.
    #[serde(skip)]
    pub equality_operators: EqOperators,

    /// Report a warning when the record has nothing to track.
    pub warn_on_no_fields: bool,

    /// Keep the signal group inside the instance (`true`) or in a side
    /// table owned by the configured type (`false`).
    pub cache_on_instance: bool,

    /// Handling of fields whose names start with `_`.
    pub alias_private_fields: PrivateFields,

    /// Appended to every derived signal name.
    pub signal_suffix: String,

    /// Explicit field to signal name overrides; `None` drops the field.
    pub signal_aliases: IndexMap<String, Option<String>>,

    /// Names every field not in `signal_aliases`, verbatim.
    #[serde(skip)]
    pub signal_alias_fn: Option<SignalAliasFn>,
}

impl Default for EventedConfig {
    fn default() -> Self {
        Self {
            namespace_name: DEFAULT_NAMESPACE.to_string(),
            equality_operators: EqOperators::new(),
            warn_on_no_fields: true,
            cache_on_instance: true,
            alias_private_fields: PrivateFields::default(),
            signal_suffix: String::new(),
            signal_aliases: IndexMap::new(),
            signal_alias_fn: None,
        }
    }
}

impl EventedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the plain options from a JSON document.
    ///
    /// Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn namespace(mut self, name: impl Into<String>) -> Self {
        self.namespace_name = name.into();
        self
    }

    /// Compare `field` with `op` instead of its default operator.
    pub fn eq_operator<T: 'static>(mut self, field: impl Into<String>, op: EqOperator<T>) -> Self {
        self.equality_operators.insert(field, op);
        self
    }

    pub fn warn_on_no_fields(mut self, warn: bool) -> Self {
        self.warn_on_no_fields = warn;
        self
    }

    pub fn cache_on_instance(mut self, on_instance: bool) -> Self {
        self.cache_on_instance = on_instance;
        self
    }

    pub fn private_fields(mut self, mode: PrivateFields) -> Self {
        self.alias_private_fields = mode;
        self
    }

    pub fn signal_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.signal_suffix = suffix.into();
        self
    }

    /// Signal `field` as `alias`, or not at all when `alias` is `None`.
    pub fn signal_alias(mut self, field: impl Into<String>, alias: Option<&str>) -> Self {
        self.signal_aliases
            .insert(field.into(), alias.map(str::to_string));
        self
    }

    /// Name signals with `alias` instead of the private-field and suffix
    /// rules. Explicit [`signal_alias`](Self::signal_alias) entries still win.
    pub fn signal_alias_fn<F>(mut self, alias: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.signal_alias_fn = Some(SignalAliasFn::new(alias));
        self
    }

    pub fn cache_strategy(&self) -> CacheStrategy {
        if self.cache_on_instance {
            CacheStrategy::OnInstance
        } else {
            CacheStrategy::SideTable
        }
    }

    pub fn naming_policy(&self) -> NamingPolicy<'_> {
        NamingPolicy {
            private_fields: self.alias_private_fields,
            suffix: &self.signal_suffix,
            aliases: &self.signal_aliases,
            alias_fn: self.signal_alias_fn.as_ref(),
        }
    }
}
