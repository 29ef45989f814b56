//! Process-wide Configuration Registry
//!
//! A record type is configured at most once per process through
//! [`install`]. Later lookups with [`installed`] hand back the same
//! [`EventedType`], which is what [`Evented::installed`](crate::Evented::installed)
//! and deserialization of `Evented<R>` rely on.
//!
//! Configuring a type directly with [`EventedType::configure`] bypasses the
//! registry entirely; such handles are independent of each other.

use std::any::{type_name, Any, TypeId};
use std::sync::OnceLock;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::EventedConfig;
use crate::error::ConfigurationError;
use crate::evented::EventedType;
use crate::record::Record;

// Record type id to its `EventedType<R>`, boxed.
static REGISTRY: OnceLock<DashMap<TypeId, Box<dyn Any + Send + Sync>>> = OnceLock::new();

fn get_registry() -> &'static DashMap<TypeId, Box<dyn Any + Send + Sync>> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Configure `R` once for the whole process.
///
/// Fails with [`ConfigurationError::AlreadyConfigured`] if `R` was installed
/// before; the first configuration stays in effect.
pub fn install<R: Record>(config: &EventedConfig) -> Result<EventedType<R>, ConfigurationError> {
    let type_name = type_name::<R>();
    if is_installed::<R>() {
        return Err(ConfigurationError::AlreadyConfigured { type_name });
    }

    let ty = EventedType::<R>::configure(config)?;

    match get_registry().entry(TypeId::of::<R>()) {
        // Lost a race with another installer.
        Entry::Occupied(_) => Err(ConfigurationError::AlreadyConfigured { type_name }),
        Entry::Vacant(entry) => {
            entry.insert(Box::new(ty.clone()));
            tracing::debug!(record = type_name, "installed evented record");
            Ok(ty)
        }
    }
}

/// The configuration installed for `R`, if any.
pub fn installed<R: Record>() -> Option<EventedType<R>> {
    get_registry()
        .get(&TypeId::of::<R>())
        .and_then(|entry| entry.value().downcast_ref::<EventedType<R>>().cloned())
}

pub fn is_installed<R: Record>() -> bool {
    get_registry().contains_key(&TypeId::of::<R>())
}
