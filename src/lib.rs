//! route-view-cache: relational view cache for chat clients.
//!
//! Nested relational query results (a record plus its related records) are
//! split into one canonical record per `(table, primary key)`. Callers get
//! live views that read and write through to those records, so every call
//! site looking at the same row sees the same data. Each route records which
//! rows it pulled in; when navigation leaves a route, its rows are released
//! and rows no route needs any more are dropped.
//!
//! ```text
//! page load ──▶ register(result, table, route) ──▶ store + ledger ──▶ views
//! navigate  ──▶ on_navigate(path) ──▶ stale routes released ──▶ orphans deleted
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod schema;
pub mod server;

pub use cache::view::{Registered, RelationView, View};
pub use cache::view_cache::{new_shared_cache, CacheStats, SharedViewCache, ViewCache};
pub use error::{CacheError, CacheResult};
