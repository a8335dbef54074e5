//! Route dependency ledger.
//!
//! For each route id, the ordered, deduplicated list of entities that were
//! pulled into the store while building views for that route. This is the
//! ownership record the eviction sweep walks.

use std::collections::{HashMap, HashSet};

use crate::cache::entity::{EntityKey, RouteId};

/// Dependencies of a single route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub route_id: RouteId,

    /// Entity keys in first-seen order.
    keys: Vec<EntityKey>,

    seen: HashSet<EntityKey>,
}

impl RouteEntry {
    pub fn new(route_id: impl Into<RouteId>) -> Self {
        Self {
            route_id: route_id.into(),
            keys: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Append `key` unless it is already listed. Returns `true` if appended.
    pub fn push(&mut self, key: EntityKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.keys.push(key);
        true
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.seen.contains(key)
    }

    pub fn keys(&self) -> &[EntityKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RouteLedger {
    routes: HashMap<RouteId, RouteEntry>,
}

impl RouteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, route_id: &str) -> Option<&RouteEntry> {
        self.routes.get(route_id)
    }

    pub fn get_or_create(&mut self, route_id: &str) -> &mut RouteEntry {
        self.routes
            .entry(route_id.to_string())
            .or_insert_with(|| RouteEntry::new(route_id))
    }

    pub fn remove(&mut self, route_id: &str) -> Option<RouteEntry> {
        self.routes.remove(route_id)
    }

    /// Tracked route ids, sorted.
    pub fn route_ids(&self) -> Vec<RouteId> {
        let mut ids: Vec<RouteId> = self.routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of tracked routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Sum of all per-route list lengths.
    pub fn total_entries(&self) -> usize {
        self.routes.values().map(RouteEntry::len).sum()
    }
}
