//! Record Types
//!
//! A record is a plain struct with a fixed set of named fields. Rust has no
//! runtime reflection, so a record describes itself through the [`Record`]
//! trait: it lists its fields as typed [`Field`] handles, each pairing a name
//! with accessor functions into the struct.
//!
//! # Example
//!
//! ```rust
//! use evented_core::{Field, Record, RecordShape};
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
//!         RecordShape::mutable()
//!             .field(Person::name())
//!             .field_with_default(Person::age(), 0)
//!     }
//! }
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::equality::{structural, EqOperators, ErasedEq};
use crate::signal::{AnySignal, Signal};

/// A structured type whose fields can be tracked for changes.
pub trait Record: Sized + Send + Sync + 'static {
    /// Describe the record's kind and fields.
    ///
    /// Called once, when the type is configured.
    fn shape() -> RecordShape<Self>;

    /// Equality operators the type declares for its own fields.
    ///
    /// Per-field operators passed in the configuration take precedence.
    fn eq_operators() -> EqOperators {
        EqOperators::new()
    }
}

/// Typed handle to one field of a record.
///
/// Handles are cheap to copy and are the only way to assign a field through
/// [`Evented::set`](crate::Evented::set).
pub struct Field<R, T> {
    name: &'static str,
    get: fn(&R) -> &T,
    get_mut: fn(&mut R) -> &mut T,
}

impl<R, T> Field<R, T> {
    pub fn new(name: &'static str, get: fn(&R) -> &T, get_mut: fn(&mut R) -> &mut T) -> Self {
        Self { name, get, get_mut }
    }

    /// The field's declared name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Borrow the field's value.
    pub fn get<'a>(&self, record: &'a R) -> &'a T {
        (self.get)(record)
    }

    pub(crate) fn get_mut<'a>(&self, record: &'a mut R) -> &'a mut T {
        (self.get_mut)(record)
    }
}

impl<R, T> Clone for Field<R, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, T> Copy for Field<R, T> {}

impl<R, T> fmt::Debug for Field<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// What kind of type a shape describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A record whose fields may be assigned.
    Mutable,

    /// A record whose fields are never reassigned.
    Frozen,

    /// Not a record: the type exposes no field list.
    Opaque,
}

/// Per-field operations that need the field's concrete value type.
pub(crate) trait FieldOps: Send + Sync {
    /// Build a fresh signal carrying this field's value type.
    fn new_signal(&self) -> Arc<dyn AnySignal>;
}

struct TypedOps<T>(std::marker::PhantomData<fn() -> T>);

impl<T: Send + Sync + 'static> FieldOps for TypedOps<T> {
    fn new_signal(&self) -> Arc<dyn AnySignal> {
        Arc::new(Signal::<T>::new())
    }
}

/// Type-erased declaration of one field.
#[derive(Clone)]
pub struct FieldDef {
    name: &'static str,
    value_type: &'static str,
    type_id: TypeId,
    default_eq: Option<ErasedEq>,
    default: Option<Arc<dyn Any + Send + Sync>>,
    ops: Arc<dyn FieldOps>,
}

impl FieldDef {
    fn new<R, T: Send + Sync + 'static>(field: Field<R, T>) -> Self {
        Self {
            name: field.name,
            value_type: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            default_eq: None,
            default: None,
            ops: Arc::new(TypedOps::<T>(std::marker::PhantomData)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the field's value type.
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn default_eq(&self) -> Option<&ErasedEq> {
        self.default_eq.as_ref()
    }

    pub(crate) fn default_value<T: 'static>(&self) -> Option<&T> {
        self.default.as_deref()?.downcast_ref::<T>()
    }

    pub(crate) fn ops(&self) -> &Arc<dyn FieldOps> {
        &self.ops
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("has_default", &self.has_default())
            .finish()
    }
}

/// The description a [`Record`] gives of itself.
pub struct RecordShape<R> {
    kind: RecordKind,
    fields: Vec<FieldDef>,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> RecordShape<R> {
    fn with_kind(kind: RecordKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            _record: std::marker::PhantomData,
        }
    }

    /// A record with assignable fields.
    pub fn mutable() -> Self {
        Self::with_kind(RecordKind::Mutable)
    }

    /// A record whose fields are never reassigned.
    pub fn frozen() -> Self {
        Self::with_kind(RecordKind::Frozen)
    }

    /// A type with no field list.
    pub fn opaque() -> Self {
        Self::with_kind(RecordKind::Opaque)
    }

    /// Declare a field compared with `PartialEq` by default.
    pub fn field<T>(mut self, field: Field<R, T>) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let mut def = FieldDef::new(field);
        def.default_eq = Some(ErasedEq::new(structural::<T>()));
        self.fields.push(def);
        self
    }

    /// Declare a field with a default value, restored by
    /// [`Evented::reset`](crate::Evented::reset).
    pub fn field_with_default<T>(mut self, field: Field<R, T>, default: T) -> Self
    where
        T: PartialEq + Clone + Send + Sync + 'static,
    {
        let mut def = FieldDef::new(field);
        def.default_eq = Some(ErasedEq::new(structural::<T>()));
        def.default = Some(Arc::new(default));
        self.fields.push(def);
        self
    }

    /// Declare a field with no default comparison.
    ///
    /// An operator must come from the configuration or from
    /// [`Record::eq_operators`], or configuration fails.
    pub fn field_without_eq<T>(mut self, field: Field<R, T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.fields.push(FieldDef::new(field));
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Name of the described type.
    pub fn type_name(&self) -> &'static str {
        type_name::<R>()
    }
}

impl<R> fmt::Debug for RecordShape<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordShape")
            .field("type", &type_name::<R>())
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .finish()
    }
}
