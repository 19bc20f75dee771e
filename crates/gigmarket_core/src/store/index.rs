//! Secondary indexes over committed records.

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Index key bound.
pub(crate) trait IndexKey: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> IndexKey for T {}

/// A key that maps to at most one entity.
#[derive(Debug)]
pub(crate) struct UniqueIndex<K: IndexKey> {
    name: &'static str,
    entries: HashMap<K, EntityId>,
}

impl<K: IndexKey> UniqueIndex<K> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Fails with `UniqueViolation` if `key` is held by another entity.
    pub(crate) fn check(&self, key: &K, entity_id: EntityId) -> CoreResult<()> {
        match self.entries.get(key) {
            Some(existing) if *existing != entity_id => Err(CoreError::UniqueViolation {
                index: self.name,
                key: format!("{key:?}"),
            }),
            _ => Ok(()),
        }
    }

    /// Callers run [`Self::check`] first; commit validation does so for the whole group.
    pub(crate) fn insert(&mut self, key: K, entity_id: EntityId) {
        self.entries.insert(key, entity_id);
    }

    pub(crate) fn get(&self, key: &K) -> Option<EntityId> {
        self.entries.get(key).copied()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A key that maps to any number of entities.
#[derive(Debug)]
pub(crate) struct MultiIndex<K: IndexKey> {
    entries: HashMap<K, BTreeSet<EntityId>>,
}

impl<K: IndexKey> MultiIndex<K> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: K, entity_id: EntityId) {
        self.entries.entry(key).or_default().insert(entity_id);
    }

    /// Entities under `key`, in ID order.
    pub(crate) fn lookup(&self, key: &K) -> Vec<EntityId> {
        self.entries
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
