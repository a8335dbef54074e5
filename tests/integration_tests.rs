//! End-to-end tests: page-load and navigation flow, directly and over HTTP.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use route_view_cache::cache::entity::EntityKey;
use route_view_cache::config::Config;
use route_view_cache::new_shared_cache;
use route_view_cache::server::api::{build_router, AppState};
use route_view_cache::ViewCache;

fn project_page() -> Value {
    json!({
        "id": "p1",
        "responses": [{
            "id": "r1",
            "modelId": "m1",
            "model": {"id": "m1", "service": {"id": "s1"}}
        }]
    })
}

#[test]
fn test_project_page_lifecycle() {
    let mut cache = ViewCache::from_config(&Config::default()).unwrap();

    let view = cache
        .register(&project_page(), "project", "/project/[id]")
        .unwrap()
        .into_single()
        .unwrap();

    let ledger = cache.ledger("/project/[id]").unwrap();
    assert_eq!(
        ledger.keys(),
        &[
            EntityKey::new("project", "p1"),
            EntityKey::new("response", "r1"),
            EntityKey::new("model", "m1"),
            EntityKey::new("service", "s1"),
        ]
    );

    let response = &view.many("responses")[0];
    assert_eq!(response.get("modelId"), Some(json!("m1")));
    assert_eq!(
        response.one("model").unwrap().one("service").unwrap().pk(),
        "s1"
    );

    cache.on_navigate("/");
    assert!(cache.store().is_empty());
    assert!(cache.route_ids().is_empty());
    assert_eq!(cache.stats().total_entities, 0);
}

fn test_app() -> Router {
    let config = Arc::new(Config::default());
    let state = Arc::new(AppState {
        cache: new_shared_cache(&config).unwrap(),
        config,
        start_time: Instant::now(),
    });
    build_router(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_http_register_patch_navigate() {
    let app = test_app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/views",
        Some(json!({"table": "project", "route_id": "/project/[id]", "data": project_page()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledger_len"], json!(4));
    assert_eq!(body["views"]["responses"][0]["model"]["service"]["id"], json!("s1"));

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/v1/entities/model/m1",
        Some(json!({"name": "claude"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("claude"));
    assert_eq!(body["referrers"], json!(["/project/[id]"]));

    let (_, body) = call(&app, Method::GET, "/v1/routes", None).await;
    assert_eq!(body[0]["entities"].as_array().unwrap().len(), 4);

    let (status, body) = call(&app, Method::POST, "/v1/navigate", Some(json!({"path": "/"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["evicted_routes"], json!(["/project/[id]"]));

    let (status, _) = call(&app, Method::GET, "/v1/entities/model/m1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, "/v1/cache/stats", None).await;
    assert_eq!(body["total_entities"], json!(0));
}

#[tokio::test]
async fn test_http_error_statuses() {
    let app = test_app();

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/views",
        Some(json!({"table": "nope", "route_id": "/", "data": {"id": "1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/views",
        Some(json!({"table": "chat", "route_id": "/", "data": {"title": "no id"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/v1/entities/chat/c404",
        Some(json!({"title": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_http_patch_rejects_primary_key() {
    let app = test_app();
    call(
        &app,
        Method::POST,
        "/v1/views",
        Some(json!({"table": "model", "route_id": "/", "data": {"id": "m1", "name": "a"}})),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/v1/entities/model/m1",
        Some(json!({"id": "m2", "name": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("primary key"));

    let (status, body) = call(&app, Method::GET, "/v1/entities/model/m1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": "m1", "name": "a"}));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = test_app();
    call(
        &app,
        Method::POST,
        "/v1/views",
        Some(json!({"table": "chat", "route_id": "/", "data": [{"id": "c1"}, {"id": "c2"}]})),
    )
    .await;

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["cache"]["tables"]["chat"], json!(2));

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("view_cache_entities 2"));
    assert!(text.contains("view_cache_registrations_total 1"));
}
