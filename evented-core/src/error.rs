//! Error types for configuring evented records and assigning their fields.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Errors raised while configuring a record type or creating its signal group.
///
/// All of these surface synchronously from the call that triggered them:
/// `EventedType::configure`, `registry::install`, or the first access to an
/// instance's signal group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The type does not expose a field list.
    #[error("{type_name} is not a record type")]
    NotARecord { type_name: &'static str },

    /// Frozen records cannot be assigned to, so there is nothing to intercept.
    #[error("{type_name} is frozen; its fields cannot be intercepted")]
    FrozenRecord { type_name: &'static str },

    /// The type was already configured through the registry.
    #[error("{type_name} is already configured for change notification")]
    AlreadyConfigured { type_name: &'static str },

    /// The type was never installed in the registry.
    #[error("{type_name} has not been configured for change notification")]
    NotConfigured { type_name: &'static str },

    /// The record declared the same field twice.
    #[error("{type_name} declares field '{field}' more than once")]
    DuplicateField {
        type_name: &'static str,
        field: String,
    },

    /// Two fields resolve to the same public signal name.
    #[error("signal name '{signal}' is produced by both '{first}' and '{second}'")]
    DuplicateSignalName {
        signal: String,
        first: String,
        second: String,
    },

    /// A field resolves to a name the signal group uses for itself.
    #[error("signal name '{signal}' for field '{field}' is reserved")]
    ReservedSignalName { signal: String, field: String },

    /// Alias or marker stripping left nothing to name the signal with.
    #[error("field '{field}' resolves to an empty signal name")]
    EmptySignalName { field: String },

    /// No per-field, type-level or default equality operator applies.
    #[error("field '{field}' has no equality operator")]
    MissingEqualityOperator { field: String },

    /// An equality operator was registered for a different value type.
    #[error("equality operator for '{field}' compares {expected}, but the field holds {actual}")]
    EqualityTypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A field handle's value type differs from the declared field's.
    #[error("field '{field}' holds {expected}, not {actual}")]
    FieldTypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// An option refers to a field the record does not declare.
    #[error("{option} refers to unknown field '{field}'")]
    UnknownField { option: &'static str, field: String },

    /// The namespace name is unusable.
    #[error("invalid namespace name '{namespace}'")]
    InvalidNamespace { namespace: String },

    /// The namespace would shadow a field of the record.
    #[error("namespace '{namespace}' collides with a field of {type_name}")]
    NamespaceCollision {
        namespace: String,
        type_name: &'static str,
    },

    /// A namespace other than the configured one was requested.
    #[error("{type_name} exposes its signals as '{expected}', not '{requested}'")]
    UnknownNamespace {
        type_name: &'static str,
        expected: String,
        requested: String,
    },

    /// `reset` was called on a field declared without a default.
    #[error("field '{field}' has no default value")]
    MissingDefault { field: String },

    /// A signal could not be built for a field.
    #[error("failed to construct signal '{signal}': {reason}")]
    SignalConstruction { signal: String, reason: String },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        ConfigurationError::Parse(err.to_string())
    }
}

/// Non-fatal findings produced while configuring a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Introspection found no trackable fields; the group will be empty.
    NoFields { type_name: &'static str },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::NoFields { type_name } => write!(
                f,
                "no mutable fields found on {type_name}; no signals will be emitted"
            ),
        }
    }
}

/// The error an equality operator returns when it cannot compare two values.
///
/// The operator's own error is kept as-is; use [`EqualityError::downcast_ref`]
/// to get it back.
pub struct EqualityError(Box<dyn StdError + Send + Sync + 'static>);

impl EqualityError {
    /// Wrap an arbitrary error raised by a comparison.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }

    /// Build an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }

    /// Borrow the original error if it has type `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Take back the original error.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.0
    }
}

impl fmt::Debug for EqualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for EqualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for EqualityError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Errors from assigning a field through [`crate::Evented::set`].
#[derive(Debug, Error)]
pub enum SetError {
    /// The field's equality operator failed; the stored value is unchanged.
    #[error(transparent)]
    Equality(#[from] EqualityError),

    /// The signal group could not be created.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
