//! route-view-cache: HTTP service around the relational view cache.
//!
//! Loads the relation schema and route templates from the config file and
//! serves the cache API so page-load handlers can register nested results
//! and report navigation.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use route_view_cache::config::{Cli, Config};
use route_view_cache::new_shared_cache;
use route_view_cache::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "route_view_cache=debug,tower_http=debug"
    } else {
        "route_view_cache=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("route-view-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let config = Arc::new(config);

    info!(
        tables = config.schema.tables.len(),
        routes = config.routes.len(),
        pinned_routes = config.eviction.pinned_routes.len(),
        "Configuration loaded"
    );

    // Initialize the shared cache.
    let cache = new_shared_cache(&config)?;

    // Build application state.
    let state = Arc::new(AppState {
        cache,
        config: config.clone(),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
