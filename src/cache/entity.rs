//! Entity types: the unit the normalized store deduplicates on.
//!
//! An entity is one logical database row, identified by `(table, primary key)`.
//! Its canonical field data lives behind a [`SharedRecord`] handle so every
//! view built over it reads and writes the same object.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scalar/opaque fields of a row. Never contains relation fields once stored.
pub type Record = Map<String, Value>;

/// Opaque identifier of a logical route/page.
pub type RouteId = String;

/// Identifies an entity across the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub table: String,
    pub pk: String,
}

impl EntityKey {
    pub fn new(table: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            pk: pk.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.pk)
    }
}

/// Shared, mutable handle to an entity's canonical record.
///
/// Cloning the handle aliases the record; it never copies the data.
#[derive(Debug, Clone, Default)]
pub struct SharedRecord(Arc<RwLock<Record>>);

impl SharedRecord {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    // Poisoned locks are recovered; the map is always structurally valid.
    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of `field`.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().get(field).cloned()
    }

    /// Overwrite `field`, returning the previous value.
    pub fn set(&self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.write().insert(field.into(), value)
    }

    /// Shallow merge: fields in `partial` win, fields absent from it are kept.
    pub fn merge(&self, partial: Record) {
        let mut data = self.write();
        for (field, value) in partial {
            data.insert(field, value);
        }
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> Record {
        self.read().clone()
    }

    /// Whether both handles point at the same canonical record.
    pub fn ptr_eq(&self, other: &SharedRecord) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A stored entity: canonical data plus the routes that keep it alive.
#[derive(Debug)]
pub struct Entity {
    pub data: SharedRecord,

    /// Route ids whose ledger lists contain this entity.
    pub referrers: HashSet<RouteId>,
}

impl Entity {
    pub fn new(data: Record, route_id: &str) -> Self {
        let mut referrers = HashSet::new();
        referrers.insert(route_id.to_string());
        Self {
            data: SharedRecord::new(data),
            referrers,
        }
    }

    /// Whether no route refers to this entity any more.
    pub fn is_orphaned(&self) -> bool {
        self.referrers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let data = SharedRecord::new(rec(json!({"id": "1", "name": "A", "x": 1})));
        data.merge(rec(json!({"id": "1", "name": "B"})));
        assert_eq!(
            Value::Object(data.snapshot()),
            json!({"id": "1", "name": "B", "x": 1})
        );
    }

    #[test]
    fn test_clones_alias_the_same_record() {
        let a = SharedRecord::new(rec(json!({"id": "1"})));
        let b = a.clone();
        b.set("title", json!("hello"));
        assert_eq!(a.get("title"), Some(json!("hello")));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&SharedRecord::new(a.snapshot())));
    }

    #[test]
    fn test_entity_key_display() {
        assert_eq!(EntityKey::new("project", "p1").to_string(), "project:p1");
    }
}
