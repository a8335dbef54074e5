//! Normalized relational view cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`entity`]: EntityKey, SharedRecord and stored Entity definitions
//! - [`store`]: Normalized store, one canonical record per row
//! - [`ledger`]: Route dependency ledger
//! - [`view`]: Live views that read and write through to the store
//! - [`evictor`]: Stale-route selection for the eviction sweep
//! - [`view_cache`]: Coordinator tying registration and eviction together

pub mod entity;
pub mod evictor;
pub mod ledger;
pub mod store;
pub mod view;
pub mod view_cache;
