//! Relational schema descriptor.
//!
//! The cache never computes relations itself: it asks a [`SchemaDescriptor`]
//! which fields of a record are relations, what cardinality they have, and
//! which table the related records belong to.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CacheError, CacheResult};

/// Whether a relation field holds a single record or a list of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// One relation field of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub cardinality: Cardinality,

    /// Table the related records belong to.
    pub table: String,
}

impl RelationDef {
    pub fn one(table: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::One,
            table: table.into(),
        }
    }

    pub fn many(table: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::Many,
            table: table.into(),
        }
    }
}

/// Relation name → definition, in a stable order.
pub type Relations = BTreeMap<String, RelationDef>;

/// Schema information for a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub relations: Relations,
}

/// Source of relation and primary-key information for the cache.
pub trait SchemaDescriptor: Send + Sync {
    /// Relation fields of `table`.
    fn relations_of(&self, table: &str) -> CacheResult<&Relations>;

    /// Primary key of `record`, rendered as a string.
    fn primary_key_of(&self, table: &str, record: &Map<String, Value>) -> CacheResult<String>;

    /// Name of the field `primary_key_of` reads.
    fn primary_key_field(&self, table: &str) -> &str;
}

/// Table-driven schema, usually loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Field holding the primary key on every table.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    #[serde(default)]
    pub tables: HashMap<String, TableSchema>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl Default for Schema {
    fn default() -> Self {
        Self::chat_app()
    }
}

impl Schema {
    /// An empty schema with the `id` primary key policy.
    pub fn empty() -> Self {
        Self {
            primary_key: default_primary_key(),
            tables: HashMap::new(),
        }
    }

    /// Builder-style table registration.
    pub fn with_table<I, S>(mut self, table: impl Into<String>, relations: I) -> Self
    where
        I: IntoIterator<Item = (S, RelationDef)>,
        S: Into<String>,
    {
        let relations = relations
            .into_iter()
            .map(|(name, def)| (name.into(), def))
            .collect();
        self.tables.insert(table.into(), TableSchema { relations });
        self
    }

    /// Schema of the chat application's local store.
    pub fn chat_app() -> Self {
        Self::empty()
            .with_table(
                "project",
                [
                    ("responses", RelationDef::many("response")),
                    ("documents", RelationDef::many("document")),
                    ("chats", RelationDef::many("chat")),
                ],
            )
            .with_table(
                "response",
                [
                    ("model", RelationDef::one("model")),
                    ("template", RelationDef::one("template")),
                ],
            )
            .with_table("model", [("service", RelationDef::one("service"))])
            .with_table("service", Vec::<(String, RelationDef)>::new())
            .with_table("document", Vec::<(String, RelationDef)>::new())
            .with_table(
                "chat",
                [
                    ("messages", RelationDef::many("message")),
                    ("model", RelationDef::one("model")),
                ],
            )
            .with_table("message", Vec::<(String, RelationDef)>::new())
            .with_table("template", Vec::<(String, RelationDef)>::new())
    }

    /// Check that every relation points at a described table.
    pub fn validate(&self) -> CacheResult<()> {
        for table in self.tables.values() {
            for def in table.relations.values() {
                if !self.tables.contains_key(&def.table) {
                    return Err(CacheError::UnknownTable(def.table.clone()));
                }
            }
        }
        Ok(())
    }
}

impl SchemaDescriptor for Schema {
    fn relations_of(&self, table: &str) -> CacheResult<&Relations> {
        self.tables
            .get(table)
            .map(|t| &t.relations)
            .ok_or_else(|| CacheError::UnknownTable(table.to_string()))
    }

    fn primary_key_of(&self, table: &str, record: &Map<String, Value>) -> CacheResult<String> {
        match record.get(&self.primary_key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(CacheError::MissingPrimaryKey {
                table: table.to_string(),
            }),
        }
    }

    fn primary_key_field(&self, _table: &str) -> &str {
        &self.primary_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_chat_app_schema_is_closed() {
        let schema = Schema::chat_app();
        assert!(schema.validate().is_ok());
        let rel = schema.relations_of("project").unwrap();
        assert_eq!(rel["responses"], RelationDef::many("response"));
    }

    #[test]
    fn test_dangling_relation_fails_validation() {
        let schema = Schema::empty().with_table("a", [("b", RelationDef::one("missing"))]);
        assert_eq!(
            schema.validate(),
            Err(CacheError::UnknownTable("missing".into()))
        );
    }

    #[test]
    fn test_primary_key_forms() {
        let schema = Schema::chat_app();
        assert_eq!(
            schema.primary_key_of("chat", &obj(json!({"id": "c1"}))).unwrap(),
            "c1"
        );
        assert_eq!(
            schema.primary_key_of("chat", &obj(json!({"id": 7}))).unwrap(),
            "7"
        );
        for bad in [json!({}), json!({"id": null}), json!({"id": ""}), json!({"id": [1]})] {
            assert!(matches!(
                schema.primary_key_of("chat", &obj(bad)),
                Err(CacheError::MissingPrimaryKey { .. })
            ));
        }
    }

    #[test]
    fn test_schema_deserializes_with_defaults() {
        let schema: Schema = serde_json::from_value(json!({
            "tables": {
                "post": { "relations": { "author": { "cardinality": "one", "table": "user" } } },
                "user": {}
            }
        }))
        .unwrap();
        assert_eq!(schema.primary_key, "id");
        assert_eq!(
            schema.relations_of("post").unwrap()["author"].cardinality,
            Cardinality::One
        );
        assert!(schema.relations_of("user").unwrap().is_empty());
    }
}
