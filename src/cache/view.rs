//! Live views over normalized entities.
//!
//! A [`View`] mirrors one entity's shape. Scalar reads and writes go straight
//! to the entity's canonical [`SharedRecord`], so two views of the same row
//! always agree. Relation fields are child views fixed when the view tree was
//! built; picking up structural changes means registering again.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::cache::entity::{EntityKey, Record, SharedRecord};
use crate::error::{CacheError, CacheResult};

/// Materialized relation of a view.
#[derive(Debug, Clone)]
pub enum RelationView {
    One(Box<View>),
    Many(Vec<View>),
}

impl RelationView {
    pub fn to_json(&self) -> Value {
        match self {
            RelationView::One(view) => view.to_json(),
            RelationView::Many(views) => Value::Array(views.iter().map(View::to_json).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct View {
    key: EntityKey,
    data: SharedRecord,
    relations: BTreeMap<String, RelationView>,

    /// Relation names from the schema; never writable as scalars.
    relation_fields: Vec<String>,

    /// Field holding the primary key; fixed for the entity's lifetime.
    primary_key: String,
}

impl View {
    pub(crate) fn new(
        key: EntityKey,
        data: SharedRecord,
        relations: BTreeMap<String, RelationView>,
        relation_fields: Vec<String>,
        primary_key: String,
    ) -> Self {
        Self {
            key,
            data,
            relations,
            relation_fields,
            primary_key,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn table(&self) -> &str {
        &self.key.table
    }

    pub fn pk(&self) -> &str {
        &self.key.pk
    }

    /// Current value of a scalar field, read from the canonical record.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.data.get(field)
    }

    /// Write a scalar field through to the canonical record.
    ///
    /// Every other view of the same entity observes the new value. Relation
    /// names are rejected so the stored record never holds relation data, and
    /// the primary key is rejected so the record stays under its own key.
    pub fn set(&self, field: &str, value: Value) -> CacheResult<Option<Value>> {
        if field == self.primary_key {
            return Err(CacheError::ImmutablePrimaryKey {
                table: self.key.table.clone(),
                field: field.to_string(),
            });
        }
        if self.relation_fields.iter().any(|r| r == field) {
            return Err(CacheError::NotAScalarField {
                table: self.key.table.clone(),
                field: field.to_string(),
            });
        }
        Ok(self.data.set(field, value))
    }

    /// Copy of the canonical scalar data.
    pub fn snapshot(&self) -> Record {
        self.data.snapshot()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationView> {
        self.relations.get(name)
    }

    /// Child view of a cardinality-one relation.
    pub fn one(&self, name: &str) -> Option<&View> {
        match self.relations.get(name)? {
            RelationView::One(view) => Some(view),
            RelationView::Many(_) => None,
        }
    }

    /// Child views of a cardinality-many relation; empty if absent.
    pub fn many(&self, name: &str) -> &[View] {
        match self.relations.get(name) {
            Some(RelationView::Many(views)) => views,
            _ => &[],
        }
    }

    /// Whether both views read and write the same canonical record.
    pub fn aliases(&self, other: &View) -> bool {
        self.data.ptr_eq(&other.data)
    }

    /// Snapshot of the whole view tree as nested JSON.
    pub fn to_json(&self) -> Value {
        let mut out = self.data.snapshot();
        for (name, relation) in &self.relations {
            out.insert(name.clone(), relation.to_json());
        }
        Value::Object(out)
    }
}

/// Result of registering either one record or a list of records.
#[derive(Debug, Clone)]
pub enum Registered {
    Single(View),
    List(Vec<View>),
}

impl Registered {
    /// The single view, or `None` for list input.
    pub fn into_single(self) -> Option<View> {
        match self {
            Registered::Single(view) => Some(view),
            Registered::List(_) => None,
        }
    }

    /// All views; a single view becomes a one-element list.
    pub fn into_views(self) -> Vec<View> {
        match self {
            Registered::Single(view) => vec![view],
            Registered::List(views) => views,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Registered::Single(view) => view.to_json(),
            Registered::List(views) => Value::Array(views.iter().map(View::to_json).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(table: &str, data: Value, relation_fields: &[&str]) -> View {
        let record = data.as_object().cloned().unwrap();
        let pk = record["id"].as_str().unwrap().to_string();
        View::new(
            EntityKey::new(table, pk),
            SharedRecord::new(record),
            BTreeMap::new(),
            relation_fields.iter().map(|s| s.to_string()).collect(),
            "id".to_string(),
        )
    }

    #[test]
    fn test_set_rejects_relation_fields() {
        let v = view("response", json!({"id": "r1"}), &["model"]);
        assert!(matches!(
            v.set("model", json!({"id": "m1"})),
            Err(CacheError::NotAScalarField { .. })
        ));
        assert_eq!(v.set("text", json!("hi")).unwrap(), None);
        assert_eq!(v.get("text"), Some(json!("hi")));
    }

    #[test]
    fn test_set_rejects_primary_key() {
        let v = view("model", json!({"id": "m1", "name": "a"}), &[]);
        assert_eq!(
            v.set("id", json!("m2")).unwrap_err(),
            CacheError::ImmutablePrimaryKey {
                table: "model".into(),
                field: "id".into()
            }
        );
        assert_eq!(v.get("id"), Some(json!("m1")));
        assert_eq!(v.pk(), "m1");
    }

    #[test]
    fn test_to_json_nests_relations() {
        let child = view("model", json!({"id": "m1", "name": "gpt"}), &[]);
        let mut relations = BTreeMap::new();
        relations.insert("model".to_string(), RelationView::One(Box::new(child)));
        let data = SharedRecord::new(json!({"id": "r1"}).as_object().cloned().unwrap());
        let parent = View::new(
            EntityKey::new("response", "r1"),
            data,
            relations,
            vec![],
            "id".to_string(),
        );

        assert_eq!(
            parent.to_json(),
            json!({"id": "r1", "model": {"id": "m1", "name": "gpt"}})
        );
        assert_eq!(parent.one("model").unwrap().pk(), "m1");
        assert!(parent.many("model").is_empty());
    }
}
