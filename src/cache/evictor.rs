//! Eviction policy: decides which tracked routes are stale for a path.
//!
//! A route is current when its pattern matches the navigation path, or when
//! it is pinned in the config. Everything else, including route ids with no
//! resolvable pattern, is stale.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::cache::entity::{EntityKey, RouteId};
use crate::config::EvictionConfig;
use crate::routes::RouteResolver;

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Path the sweep ran against.
    pub path: String,

    /// Route ids whose ledger entries were removed, sorted.
    pub evicted_routes: Vec<RouteId>,

    /// Entities deleted because no route referred to them any more.
    pub evicted_entities: Vec<EntityKey>,

    /// Routes still tracked after the sweep.
    pub retained_routes: usize,
}

impl EvictionReport {
    /// Whether the sweep changed nothing.
    pub fn is_noop(&self) -> bool {
        self.evicted_routes.is_empty() && self.evicted_entities.is_empty()
    }
}

/// The eviction policy engine.
pub struct Evictor {
    resolver: Arc<dyn RouteResolver>,
    config: EvictionConfig,
}

impl Evictor {
    pub fn new(resolver: Arc<dyn RouteResolver>, config: EvictionConfig) -> Self {
        Self { resolver, config }
    }

    /// Whether `route_id` still applies at `path`.
    pub fn is_current(&self, route_id: &str, path: &str) -> bool {
        if self.config.pinned_routes.iter().any(|r| r == route_id) {
            return true;
        }
        match self.resolver.pattern_of(route_id) {
            Some(pattern) => pattern.test(path),
            None => {
                warn!(route_id, "No route pattern resolves; treating route as stale");
                false
            }
        }
    }

    /// Select the route ids that no longer apply at `path`, in input order.
    pub fn select_stale<I, S>(&self, route_ids: I, path: &str) -> Vec<RouteId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        route_ids
            .into_iter()
            .filter(|id| !self.is_current(id.as_ref(), path))
            .map(|id| id.as_ref().to_string())
            .collect()
    }
}
