//! HTTP API over a shared view cache.
//!
//! Lets a page-load handler (or a developer) drive the cache remotely:
//! - POST /v1/views
//! - POST /v1/navigate
//! - GET/PATCH /v1/entities/{table}/{pk}
//! - GET /v1/routes
//! - GET /v1/cache/stats
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::cache::entity::{Entity, EntityKey, Record, RouteId};
use crate::cache::evictor::EvictionReport;
use crate::cache::view_cache::{CacheStats, SharedViewCache};
use crate::config::Config;
use crate::error::CacheError;

/// Application state shared across handlers.
pub struct AppState {
    pub cache: SharedViewCache,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    Router::new()
        .route("/v1/views", post(register_view))
        .route("/v1/navigate", post(navigate))
        .route(
            "/v1/entities/{table}/{pk}",
            get(get_entity).patch(patch_entity),
        )
        .route("/v1/routes", get(list_routes))
        .route("/v1/cache/stats", get(cache_stats))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Cache(CacheError),
    NotFound(String),
    Internal(String),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Cache(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Cache(err @ CacheError::UnknownTable(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Cache(err @ CacheError::InvalidRoutePattern { .. }) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Cache(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not cached")),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Register a nested relational result for a route.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub table: String,
    pub route_id: RouteId,
    /// One nested record or a list of them.
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub route_id: RouteId,
    pub ledger_len: usize,
    /// Snapshot of the view tree.
    pub views: Value,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct EntityResponse {
    pub table: String,
    pub pk: String,
    pub data: Record,
    pub referrers: Vec<RouteId>,
}

impl EntityResponse {
    fn new(table: String, pk: String, entity: &Entity) -> Self {
        let mut referrers: Vec<RouteId> = entity.referrers.iter().cloned().collect();
        referrers.sort();
        Self {
            table,
            pk,
            data: entity.data.snapshot(),
            referrers,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RouteSummary {
    pub route_id: RouteId,
    pub entities: Vec<EntityKey>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn register_view(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    let mut cache = state.cache.write().await;
    let registered = cache.register(&req.data, &req.table, &req.route_id)?;
    let ledger_len = cache.ledger(&req.route_id).map(|e| e.len()).unwrap_or(0);

    info!(
        request_id,
        table = req.table,
        route_id = req.route_id,
        ledger_len,
        "Registered view"
    );

    Ok(Json(RegisterResponse {
        route_id: req.route_id,
        ledger_len,
        views: registered.to_json(),
    }))
}

async fn navigate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NavigateRequest>,
) -> Json<EvictionReport> {
    let request_id = Uuid::new_v4().to_string();
    let report = state.cache.write().await.on_navigate(&req.path);

    info!(
        request_id,
        path = req.path,
        evicted_routes = report.evicted_routes.len(),
        evicted_entities = report.evicted_entities.len(),
        "Navigation handled"
    );
    Json(report)
}

async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path((table, pk)): Path<(String, String)>,
) -> Result<Json<EntityResponse>, ApiError> {
    let cache = state.cache.read().await;
    let entity = cache
        .entity(&table, &pk)
        .ok_or_else(|| ApiError::NotFound(EntityKey::new(table.as_str(), pk.as_str()).to_string()))?;
    Ok(Json(EntityResponse::new(table, pk, entity)))
}

async fn patch_entity(
    State(state): State<Arc<AppState>>,
    Path((table, pk)): Path<(String, String)>,
    Json(partial): Json<Record>,
) -> Result<Json<EntityResponse>, ApiError> {
    let mut cache = state.cache.write().await;
    if cache.update(&table, &pk, partial)?.is_none() {
        return Err(ApiError::NotFound(EntityKey::new(table, pk).to_string()));
    }
    let entity = cache
        .entity(&table, &pk)
        .ok_or_else(|| ApiError::NotFound(EntityKey::new(table.as_str(), pk.as_str()).to_string()))?;
    Ok(Json(EntityResponse::new(table, pk, entity)))
}

async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<RouteSummary>> {
    let cache = state.cache.read().await;
    let routes = cache
        .route_ids()
        .into_iter()
        .map(|route_id| {
            let entities = cache
                .ledger(&route_id)
                .map(|entry| entry.keys().to_vec())
                .unwrap_or_default();
            RouteSummary { route_id, entities }
        })
        .collect();
    Json(routes)
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.read().await.stats())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: state.cache.read().await.stats(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let text = state.cache.read().await.metrics().encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        ApiError::Internal(format!("Failed to encode metrics: {e}"))
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        text,
    )
        .into_response())
}
