//! Normalized store: `table → primary key → entity`.
//!
//! Holds exactly one canonical record per logical row. Merges mutate the
//! existing record in place so handles given out earlier keep observing it.

use std::collections::{BTreeMap, HashMap};

use crate::cache::entity::{Entity, EntityKey, Record, SharedRecord};

#[derive(Debug, Default)]
pub struct NormalizedStore {
    tables: HashMap<String, HashMap<String, Entity>>,
}

impl NormalizedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str, pk: &str) -> Option<&Entity> {
        self.tables.get(table)?.get(pk)
    }

    pub fn get_mut(&mut self, table: &str, pk: &str) -> Option<&mut Entity> {
        self.tables.get_mut(table)?.get_mut(pk)
    }

    pub fn contains(&self, table: &str, pk: &str) -> bool {
        self.get(table, pk).is_some()
    }

    /// Insert a new entity referred to by `route_id`.
    ///
    /// An existing entity under the same key is replaced; see
    /// [`upsert`](Self::upsert) for merge-or-insert.
    pub fn put(&mut self, table: &str, pk: &str, data: Record, route_id: &str) -> SharedRecord {
        let entity = Entity::new(data, route_id);
        let handle = entity.data.clone();
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(pk.to_string(), entity);
        handle
    }

    /// Shallow-merge `partial` into an existing entity's canonical data.
    ///
    /// Returns the (unchanged) handle, or `None` if the entity is not stored.
    pub fn merge(&mut self, table: &str, pk: &str, partial: Record) -> Option<SharedRecord> {
        let entity = self.get(table, pk)?;
        entity.data.merge(partial);
        Some(entity.data.clone())
    }

    /// Merge into an existing entity or insert a new one, registering
    /// `route_id` as a referrer either way.
    ///
    /// Returns the canonical handle and whether the entity was newly created.
    pub fn upsert(
        &mut self,
        table: &str,
        pk: &str,
        data: Record,
        route_id: &str,
    ) -> (SharedRecord, bool) {
        match self.get_mut(table, pk) {
            Some(entity) => {
                entity.data.merge(data);
                entity.referrers.insert(route_id.to_string());
                (entity.data.clone(), false)
            }
            None => (self.put(table, pk, data, route_id), true),
        }
    }

    /// Returns `true` if the route was not already a referrer.
    pub fn add_referrer(&mut self, table: &str, pk: &str, route_id: &str) -> bool {
        match self.get_mut(table, pk) {
            Some(entity) => entity.referrers.insert(route_id.to_string()),
            None => false,
        }
    }

    /// Drop `route_id` from the entity's referrers.
    ///
    /// Returns `Some(true)` when the entity is left without referrers,
    /// `None` when the entity is not stored.
    pub fn remove_referrer(&mut self, table: &str, pk: &str, route_id: &str) -> Option<bool> {
        let entity = self.get_mut(table, pk)?;
        entity.referrers.remove(route_id);
        Some(entity.is_orphaned())
    }

    pub fn delete(&mut self, table: &str, pk: &str) -> Option<Entity> {
        let rows = self.tables.get_mut(table)?;
        let removed = rows.remove(pk);
        if rows.is_empty() {
            self.tables.remove(table);
        }
        removed
    }

    /// Total number of stored entities.
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Entity count per table, sorted by table name.
    pub fn table_counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|(table, rows)| (table.clone(), rows.len()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> + '_ {
        self.tables.iter().flat_map(|(table, rows)| {
            rows.iter()
                .map(move |(pk, entity)| (EntityKey::new(table.clone(), pk.clone()), entity))
        })
    }
}
