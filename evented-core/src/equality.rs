//! Equality operators used to decide whether an assignment changed a field.
//!
//! Each tracked field resolves one [`EqOperator`] at configuration time, in
//! this order:
//!
//! 1. an operator passed in [`EventedConfig`](crate::EventedConfig),
//! 2. an operator from the record's own [`Record::eq_operators`](crate::Record::eq_operators),
//! 3. the default declared with the field (structural `PartialEq`).
//!
//! Operators may fail. A failing operator aborts the assignment that invoked
//! it and its error reaches the caller untouched.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EqualityError;

type CompareFn<T> = dyn Fn(&T, &T) -> Result<bool, EqualityError> + Send + Sync;

/// A shared comparison between an old and a new value of type `T`.
///
/// Returns `Ok(true)` when the values are considered equal, in which case no
/// notification is sent.
pub struct EqOperator<T: 'static> {
    compare: Arc<CompareFn<T>>,
}

impl<T: 'static> EqOperator<T> {
    /// Build an operator from an infallible comparison.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(move |a: &T, b: &T| Ok(compare(a, b))),
        }
    }

    /// Build an operator whose comparison can fail.
    pub fn fallible<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Result<bool, EqualityError> + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Compare two values.
    pub fn equal(&self, old: &T, new: &T) -> Result<bool, EqualityError> {
        (self.compare)(old, new)
    }
}

impl<T: 'static> Clone for EqOperator<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<T: 'static> fmt::Debug for EqOperator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EqOperator<{}>", type_name::<T>())
    }
}

/// Structural equality through `PartialEq`.
pub fn structural<T: PartialEq + 'static>() -> EqOperator<T> {
    EqOperator::new(|a: &T, b: &T| a == b)
}

/// Array equality: same length and element-wise equal.
///
/// Works for any slice-like value (`Vec<E>`, `[E; N]`, `Box<[E]>`, ...), which
/// lets types that do not implement `PartialEq` themselves still be compared
/// through their elements.
pub fn array_equal<T, E>() -> EqOperator<T>
where
    T: AsRef<[E]> + 'static,
    E: PartialEq + 'static,
{
    EqOperator::new(|a: &T, b: &T| {
        let (a, b) = (a.as_ref(), b.as_ref());
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
    })
}

/// Pointer identity for shared values.
pub fn identity<U: ?Sized + 'static>() -> EqOperator<Arc<U>> {
    EqOperator::new(|a: &Arc<U>, b: &Arc<U>| Arc::ptr_eq(a, b))
}

/// An [`EqOperator`] with its value type erased, so operators for fields of
/// different types can live in one map.
#[derive(Clone)]
pub(crate) struct ErasedEq {
    op: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    value_type: &'static str,
}

impl ErasedEq {
    pub(crate) fn new<T: 'static>(op: EqOperator<T>) -> Self {
        Self {
            op: Arc::new(op),
            type_id: TypeId::of::<T>(),
            value_type: type_name::<T>(),
        }
    }

    pub(crate) fn downcast<T: 'static>(&self) -> Option<&EqOperator<T>> {
        self.op.downcast_ref::<EqOperator<T>>()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn value_type(&self) -> &'static str {
        self.value_type
    }
}

impl fmt::Debug for ErasedEq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EqOperator<{}>", self.value_type)
    }
}

/// Field name to equality operator map.
///
/// Used both for per-field overrides in the configuration and for the
/// operators a record type declares for itself.
#[derive(Clone, Default)]
pub struct EqOperators {
    ops: HashMap<String, ErasedEq>,
}

impl EqOperators {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operator for `field`, replacing any previous one.
    pub fn insert<T: 'static>(&mut self, field: impl Into<String>, op: EqOperator<T>) {
        self.ops.insert(field.into(), ErasedEq::new(op));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: 'static>(mut self, field: impl Into<String>, op: EqOperator<T>) -> Self {
        self.insert(field, op);
        self
    }

    /// Whether an operator is registered for `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.ops.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Names of all fields with an operator.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub(crate) fn get(&self, field: &str) -> Option<&ErasedEq> {
        self.ops.get(field)
    }
}

impl fmt::Debug for EqOperators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.ops.iter()).finish()
    }
}
