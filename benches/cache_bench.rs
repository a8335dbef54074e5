//! Benchmarks for the view cache.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use route_view_cache::cache::view_cache::ViewCache;
use route_view_cache::config::EvictionConfig;
use route_view_cache::metrics::CacheMetrics;
use route_view_cache::routes::{RoutePattern, RouteTable};
use route_view_cache::schema::Schema;

fn new_cache() -> ViewCache {
    ViewCache::new(
        Arc::new(Schema::chat_app()),
        Arc::new(RouteTable::new()),
        EvictionConfig::default(),
        CacheMetrics::new().unwrap(),
    )
}

/// A project with 200 responses spread over 10 models and 3 services.
fn large_project(id: usize) -> Value {
    let responses: Vec<Value> = (0..200)
        .map(|i| {
            json!({
                "id": format!("r{id}-{i}"),
                "text": "lorem ipsum",
                "model": {
                    "id": format!("m{}", i % 10),
                    "service": {"id": format!("s{}", i % 3)}
                }
            })
        })
        .collect();
    json!({"id": format!("p{id}"), "name": "bench", "responses": responses})
}

fn bench_register(c: &mut Criterion) {
    let project = large_project(0);

    c.bench_function("register_project_200_responses", |b| {
        let mut cache = new_cache();
        b.iter(|| {
            let view = cache.register(black_box(&project), "project", "/project/[id]");
            black_box(view).unwrap();
        })
    });
}

fn bench_sweep(c: &mut Criterion) {
    c.bench_function("sweep_50_routes", |b| {
        b.iter_batched(
            || {
                let mut cache = new_cache();
                for i in 0..50 {
                    let route = format!("/project/{i}");
                    cache.register(&large_project(i), "project", &route).unwrap();
                }
                cache
            },
            |mut cache| black_box(cache.on_navigate("/")),
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_route_match(c: &mut Criterion) {
    let pattern = RoutePattern::parse("/project/[id]/chat/[...rest]").unwrap();

    c.bench_function("route_pattern_test", |b| {
        b.iter(|| black_box(pattern.test(black_box("/project/p1/chat/c1/messages?x=1"))))
    });
}

criterion_group!(benches, bench_register, bench_sweep, bench_route_match);
criterion_main!(benches);
