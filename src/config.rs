//! Runtime configuration for route-view-cache.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! The relation schema, known route templates and eviction knobs live here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::routes::RouteTable;
use crate::schema::Schema;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "route-view-cache", about = "Relational view cache service")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address; overrides `server.listen` from the config file.
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Relation schema of the local store.
    pub schema: Schema,

    /// Route templates known up front. Route ids not listed here are
    /// resolved by parsing the id itself as a template.
    pub routes: Vec<String>,

    /// Eviction policy tuning.
    pub eviction: EvictionConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "127.0.0.1:8787").
    pub listen: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Eviction policy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvictionConfig {
    /// Route ids that are never considered stale (e.g. always-mounted layouts).
    pub pinned_routes: Vec<String>,
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file is missing and for any field it leaves out.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config: Config = serde_json::from_str(&data)
                .with_context(|| format!("parsing config {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Check schema closure and route template syntax.
    pub fn validate(&self) -> CacheResult<()> {
        self.schema.validate()?;
        self.route_table()?;
        Ok(())
    }

    /// Compile the configured route templates.
    pub fn route_table(&self) -> CacheResult<RouteTable> {
        RouteTable::from_templates(&self.routes)
    }
}
