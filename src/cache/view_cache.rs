//! View cache: the central coordinator.
//!
//! The view cache:
//! - Normalizes nested relational results into the [`NormalizedStore`]
//! - Records which route pulled in which entity in the [`RouteLedger`]
//! - Hands out live [`View`] trees over the canonical records
//! - Sweeps routes that no longer match the navigation path and deletes
//!   entities left without referrers

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::entity::{Entity, EntityKey, Record, RouteId};
use crate::cache::evictor::{EvictionReport, Evictor};
use crate::cache::ledger::{RouteEntry, RouteLedger};
use crate::cache::store::NormalizedStore;
use crate::cache::view::{Registered, RelationView, View};
use crate::config::{Config, EvictionConfig};
use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::routes::RouteResolver;
use crate::schema::{Cardinality, SchemaDescriptor};

/// Cache size summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entities stored, all tables.
    pub total_entities: usize,
    /// Routes tracked by the ledger.
    pub total_routes: usize,
    /// Sum of ledger list lengths.
    pub ledger_entries: usize,
    /// Entities per table.
    pub tables: BTreeMap<String, usize>,
}

/// A validated record, ready to be written into the store.
///
/// `register` first turns the whole input tree into plans so that a malformed
/// subtree fails the call before anything is mutated.
struct Plan {
    key: EntityKey,
    scalars: Record,
    relation_fields: Vec<String>,
    primary_key: String,
    children: Vec<(String, ChildPlan)>,
}

enum ChildPlan {
    One(Vec<Plan>),
    Many(Vec<Plan>),
}

/// The relational view cache.
pub struct ViewCache {
    /// Canonical entities.
    store: NormalizedStore,

    /// Route → entity dependencies.
    ledger: RouteLedger,

    /// Relation and primary-key source.
    schema: Arc<dyn SchemaDescriptor>,

    /// Stale-route policy.
    evictor: Evictor,

    metrics: CacheMetrics,
}

impl ViewCache {
    pub fn new(
        schema: Arc<dyn SchemaDescriptor>,
        routes: Arc<dyn RouteResolver>,
        eviction: EvictionConfig,
        metrics: CacheMetrics,
    ) -> Self {
        Self {
            store: NormalizedStore::new(),
            ledger: RouteLedger::new(),
            schema,
            evictor: Evictor::new(routes, eviction),
            metrics,
        }
    }

    /// Build a cache from the schema, route templates and eviction settings
    /// in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let routes = config.route_table()?;
        Ok(Self::new(
            Arc::new(config.schema.clone()),
            Arc::new(routes),
            config.eviction.clone(),
            CacheMetrics::new()?,
        ))
    }

    /// Normalize `view` (one nested record or a list of them) belonging to
    /// `table` into the store on behalf of `route_id`, returning live views.
    ///
    /// On error the store and ledger are left untouched.
    pub fn register(&mut self, view: &Value, table: &str, route_id: &str) -> CacheResult<Registered> {
        let registered = match view {
            Value::Array(records) => {
                let plans = records
                    .iter()
                    .map(|record| self.plan(record, table))
                    .collect::<CacheResult<Vec<_>>>()?;
                Registered::List(
                    plans
                        .into_iter()
                        .map(|plan| self.apply(plan, route_id))
                        .collect(),
                )
            }
            record => {
                let plan = self.plan(record, table)?;
                Registered::Single(self.apply(plan, route_id))
            }
        };

        self.metrics.registrations_total.inc();
        self.refresh_gauges();
        debug!(
            table,
            route_id,
            ledger_len = self.ledger.get(route_id).map(RouteEntry::len).unwrap_or(0),
            "Registered view"
        );
        Ok(registered)
    }

    /// Register a single record and return its view.
    pub fn register_one(&mut self, record: &Value, table: &str, route_id: &str) -> CacheResult<View> {
        let plan = self.plan(record, table)?;
        let view = self.apply(plan, route_id);
        self.metrics.registrations_total.inc();
        self.refresh_gauges();
        Ok(view)
    }

    /// Validate one record and its related records against the schema.
    fn plan(&self, record: &Value, table: &str) -> CacheResult<Plan> {
        let relations = self.schema.relations_of(table)?;
        let fields = record.as_object().ok_or_else(|| CacheError::InvalidRecord {
            table: table.to_string(),
        })?;
        let pk = self.schema.primary_key_of(table, fields)?;

        let mut scalars = Map::new();
        for (field, value) in fields {
            if !relations.contains_key(field) {
                scalars.insert(field.clone(), value.clone());
            }
        }

        let mut children = Vec::new();
        for (name, def) in relations {
            let related: Vec<&Value> = match fields.get(name) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(items)) if items.is_empty() => continue,
                Some(Value::Array(items)) => items.iter().collect(),
                Some(other) => vec![other],
            };
            let plans = related
                .into_iter()
                .map(|child| self.plan(child, &def.table))
                .collect::<CacheResult<Vec<_>>>()?;
            let child = match def.cardinality {
                Cardinality::One => ChildPlan::One(plans),
                Cardinality::Many => ChildPlan::Many(plans),
            };
            children.push((name.clone(), child));
        }

        Ok(Plan {
            key: EntityKey::new(table, pk),
            scalars,
            relation_fields: relations.keys().cloned().collect(),
            primary_key: self.schema.primary_key_field(table).to_string(),
            children,
        })
    }

    /// Write a validated plan into the store and ledger, depth-first.
    fn apply(&mut self, plan: Plan, route_id: &str) -> View {
        let Plan {
            key,
            scalars,
            relation_fields,
            primary_key,
            children,
        } = plan;

        let (data, inserted) = self.store.upsert(&key.table, &key.pk, scalars, route_id);
        if inserted {
            self.metrics.entities_inserted_total.inc();
            debug!(entity = %key, route_id, "Inserted entity");
        } else {
            self.metrics.entities_merged_total.inc();
            debug!(entity = %key, route_id, "Merged entity");
        }
        self.ledger.get_or_create(route_id).push(key.clone());

        let mut relations = BTreeMap::new();
        for (name, child) in children {
            let relation = match child {
                ChildPlan::Many(plans) => RelationView::Many(
                    plans
                        .into_iter()
                        .map(|plan| self.apply(plan, route_id))
                        .collect(),
                ),
                ChildPlan::One(plans) => {
                    // Every element is normalized; the first one is exposed.
                    let mut views = plans
                        .into_iter()
                        .map(|plan| self.apply(plan, route_id))
                        .collect::<Vec<_>>();
                    if views.is_empty() {
                        continue;
                    }
                    RelationView::One(Box::new(views.swap_remove(0)))
                }
            };
            relations.insert(name, relation);
        }

        View::new(key, data, relations, relation_fields, primary_key)
    }

    /// Run the eviction sweep for the current navigation path.
    ///
    /// Every tracked route whose pattern does not match `path` loses its
    /// ledger entry and its claim on the entities it pulled in; entities with
    /// no remaining referrer are deleted. Idempotent for a given path.
    pub fn on_navigate(&mut self, path: &str) -> EvictionReport {
        let stale = self.evictor.select_stale(self.ledger.route_ids(), path);

        let mut report = EvictionReport {
            path: path.to_string(),
            ..Default::default()
        };
        for route_id in stale {
            let evicted = self.evict_route(&route_id);
            report.evicted_entities.extend(evicted);
            report.evicted_routes.push(route_id);
        }
        report.retained_routes = self.ledger.len();

        if !report.is_noop() {
            info!(
                path,
                routes = report.evicted_routes.len(),
                entities = report.evicted_entities.len(),
                retained_routes = report.retained_routes,
                "Eviction sweep complete"
            );
        }
        report
    }

    /// Drop `route_id` from the ledger and release its entities.
    ///
    /// Returns the keys of entities deleted because this route was their
    /// last referrer.
    pub fn evict_route(&mut self, route_id: &str) -> Vec<EntityKey> {
        let Some(entry) = self.ledger.remove(route_id) else {
            return Vec::new();
        };

        let mut deleted = Vec::new();
        for key in entry.keys() {
            if self.store.remove_referrer(&key.table, &key.pk, route_id) == Some(true) {
                self.store.delete(&key.table, &key.pk);
                debug!(entity = %key, route_id, "Evicted entity");
                deleted.push(key.clone());
            }
        }

        self.metrics.routes_evicted_total.inc();
        self.metrics.entities_evicted_total.inc_by(deleted.len() as u64);
        self.refresh_gauges();
        deleted
    }

    /// Write scalar fields through to an entity's canonical record, exactly
    /// as a view setter would. Returns the updated record, or `None` if the
    /// entity is not cached.
    pub fn update(&mut self, table: &str, pk: &str, partial: Record) -> CacheResult<Option<Record>> {
        let relations = self.schema.relations_of(table)?;
        let primary_key = self.schema.primary_key_field(table);
        if partial.contains_key(primary_key) {
            return Err(CacheError::ImmutablePrimaryKey {
                table: table.to_string(),
                field: primary_key.to_string(),
            });
        }
        if let Some(field) = partial.keys().find(|f| relations.contains_key(*f)) {
            return Err(CacheError::NotAScalarField {
                table: table.to_string(),
                field: field.clone(),
            });
        }
        Ok(self
            .store
            .merge(table, pk, partial)
            .map(|handle| handle.snapshot()))
    }

    pub fn entity(&self, table: &str, pk: &str) -> Option<&Entity> {
        self.store.get(table, pk)
    }

    pub fn ledger(&self, route_id: &str) -> Option<&RouteEntry> {
        self.ledger.get(route_id)
    }

    /// Tracked route ids, sorted.
    pub fn route_ids(&self) -> Vec<RouteId> {
        self.ledger.route_ids()
    }

    pub fn store(&self) -> &NormalizedStore {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entities: self.store.len(),
            total_routes: self.ledger.len(),
            ledger_entries: self.ledger.total_entries(),
            tables: self.store.table_counts(),
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn refresh_gauges(&self) {
        self.metrics.set_sizes(self.store.len(), self.ledger.len());
    }
}

/// Single-writer wrapper around the view cache.
pub type SharedViewCache = Arc<RwLock<ViewCache>>;

/// Create a new shared view cache from `config`.
pub fn new_shared_cache(config: &Config) -> anyhow::Result<SharedViewCache> {
    Ok(Arc::new(RwLock::new(ViewCache::from_config(config)?)))
}
