//! Prometheus metrics for the view cache.
//!
//! Each [`CacheMetrics`] owns its own registry so several caches (and tests)
//! can coexist in one process.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct CacheMetrics {
    registry: Registry,

    /// `register` calls that completed.
    pub registrations_total: IntCounter,

    /// Entities created by `register`.
    pub entities_inserted_total: IntCounter,

    /// Entities merged into an existing canonical record.
    pub entities_merged_total: IntCounter,

    /// Entities deleted after losing their last referrer.
    pub entities_evicted_total: IntCounter,

    /// Route ledger entries dropped by the sweep.
    pub routes_evicted_total: IntCounter,

    /// Entities currently stored.
    pub entities: IntGauge,

    /// Routes currently tracked.
    pub routes: IntGauge,
}

impl CacheMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let registrations_total = IntCounter::new(
            "view_cache_registrations_total",
            "Completed register calls",
        )?;
        let entities_inserted_total = IntCounter::new(
            "view_cache_entities_inserted_total",
            "Entities inserted into the normalized store",
        )?;
        let entities_merged_total = IntCounter::new(
            "view_cache_entities_merged_total",
            "Entities merged into an existing canonical record",
        )?;
        let entities_evicted_total = IntCounter::new(
            "view_cache_entities_evicted_total",
            "Entities deleted after losing their last referring route",
        )?;
        let routes_evicted_total = IntCounter::new(
            "view_cache_routes_evicted_total",
            "Route ledger entries removed by eviction",
        )?;
        let entities = IntGauge::new("view_cache_entities", "Entities currently stored")?;
        let routes = IntGauge::new("view_cache_routes", "Routes currently tracked")?;

        registry.register(Box::new(registrations_total.clone()))?;
        registry.register(Box::new(entities_inserted_total.clone()))?;
        registry.register(Box::new(entities_merged_total.clone()))?;
        registry.register(Box::new(entities_evicted_total.clone()))?;
        registry.register(Box::new(routes_evicted_total.clone()))?;
        registry.register(Box::new(entities.clone()))?;
        registry.register(Box::new(routes.clone()))?;

        Ok(Self {
            registry,
            registrations_total,
            entities_inserted_total,
            entities_merged_total,
            entities_evicted_total,
            routes_evicted_total,
            entities,
            routes,
        })
    }

    /// Refresh the size gauges.
    pub fn set_sizes(&self, entities: usize, routes: usize) {
        self.entities.set(entities as i64);
        self.routes.set(routes as i64);
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for CacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMetrics")
            .field("entities", &self.entities.get())
            .field("routes", &self.routes.get())
            .finish()
    }
}
