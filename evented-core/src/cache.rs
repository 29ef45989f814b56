//! Instance Cache
//!
//! Each evented instance owns at most one [`SignalGroup`], created on first
//! use and never replaced. Where that group lives is picked once per record
//! type:
//!
//! - [`CacheStrategy::OnInstance`]: a `OnceLock` inside the instance. One
//!   atomic load per access.
//! - [`CacheStrategy::SideTable`]: a `DashMap` owned by the configured type,
//!   keyed by [`InstanceId`]. The instance carries nothing but its id, and its
//!   entry is removed when the instance is dropped.
//!
//! Both strategies publish exactly one group per instance, even when several
//! threads race to create it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::ConfigurationError;
use crate::group::SignalGroup;

/// Where an instance's signal group is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Inside the instance.
    #[default]
    OnInstance,

    /// In a table owned by the configured record type.
    SideTable,
}

/// Lifecycle of an instance's signal group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Nothing has needed the group yet.
    Uncreated,

    /// The group exists and will be returned by every later access.
    Created,
}

/// Identity of one evented instance.
///
/// Rust values move, so addresses are no identity; ids come from a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Instance id to signal group map used by [`CacheStrategy::SideTable`].
#[derive(Debug, Default)]
pub(crate) struct SideTable {
    groups: DashMap<InstanceId, Arc<SignalGroup>>,
}

impl SideTable {
    /// Return the group for `id`, building it under the entry lock if absent.
    fn get_or_try_create<F>(
        &self,
        id: InstanceId,
        build: F,
    ) -> Result<Arc<SignalGroup>, ConfigurationError>
    where
        F: FnOnce() -> Result<SignalGroup, ConfigurationError>,
    {
        if let Some(group) = self.groups.get(&id) {
            return Ok(Arc::clone(group.value()));
        }
        match self.groups.entry(id) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let group = Arc::new(build()?);
                entry.insert(Arc::clone(&group));
                Ok(group)
            }
        }
    }

    fn peek(&self, id: InstanceId) -> Option<Arc<SignalGroup>> {
        self.groups.get(&id).map(|group| Arc::clone(group.value()))
    }

    pub(crate) fn remove(&self, id: InstanceId) {
        self.groups.remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }
}

/// The per-instance half of the cache.
#[derive(Debug)]
pub(crate) enum InstanceSlot {
    OnInstance(OnceLock<Arc<SignalGroup>>),
    SideTable,
}

impl InstanceSlot {
    pub(crate) fn new(strategy: CacheStrategy) -> Self {
        match strategy {
            CacheStrategy::OnInstance => InstanceSlot::OnInstance(OnceLock::new()),
            CacheStrategy::SideTable => InstanceSlot::SideTable,
        }
    }

    /// Return the instance's group, creating it on first call.
    pub(crate) fn get_or_try_create<F>(
        &self,
        id: InstanceId,
        table: &SideTable,
        build: F,
    ) -> Result<Arc<SignalGroup>, ConfigurationError>
    where
        F: FnOnce() -> Result<SignalGroup, ConfigurationError>,
    {
        match self {
            InstanceSlot::OnInstance(cell) => {
                if let Some(group) = cell.get() {
                    return Ok(Arc::clone(group));
                }
                // A racing thread may publish first; its group wins and ours is dropped.
                let group = Arc::new(build()?);
                Ok(Arc::clone(cell.get_or_init(|| group)))
            }
            InstanceSlot::SideTable => table.get_or_try_create(id, build),
        }
    }

    /// The group, if it was created.
    pub(crate) fn peek(&self, id: InstanceId, table: &SideTable) -> Option<Arc<SignalGroup>> {
        match self {
            InstanceSlot::OnInstance(cell) => cell.get().cloned(),
            InstanceSlot::SideTable => table.peek(id),
        }
    }

    pub(crate) fn state(&self, id: InstanceId, table: &SideTable) -> GroupState {
        match self.peek(id, table) {
            Some(_) => GroupState::Created,
            None => GroupState::Uncreated,
        }
    }
}
