//! 경로 템플릿 벤치마크
//!
//! 템플릿 확장(캐시 적중/미스)과 라우트 해석의 처리량을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Map, Value, json};

use logroute_pipeline::{PipelineContext, RouteResolver, RoutingTable, TemplateEngine};

const SIMPLE: &str = "auth/{date:yyyy-MM-dd}.log";
const NESTED: &str = "tenants/{tenant}/{region}/{flag}/{date:yyyy/MM/dd}.log";

fn data(tenant: &str) -> Map<String, Value> {
    let value = json!({
        "tenant": tenant,
        "region": "eu-west-1",
        "flag": "USER_LOGIN",
        "date": "2024-01-15T12:00:00.000Z",
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_expand");
    group.throughput(Throughput::Elements(1));

    for (name, template) in [("simple", SIMPLE), ("nested", NESTED)] {
        // 같은 데이터 반복 -> 캐시 적중
        let engine = TemplateEngine::with_defaults(Arc::new(PipelineContext::new(1000))).unwrap();
        let hot = data("acme");
        group.bench_with_input(BenchmarkId::new("cached", name), template, |b, t| {
            b.iter(|| engine.expand(black_box(t), black_box(&hot)))
        });

        // 매번 다른 테넌트 -> 캐시 미스
        let engine = TemplateEngine::with_defaults(Arc::new(PipelineContext::new(16))).unwrap();
        let tenants: Vec<Map<String, Value>> = (0..256).map(|i| data(&format!("t{i}"))).collect();
        let mut i = 0usize;
        group.bench_with_input(BenchmarkId::new("uncached", name), template, |b, t| {
            b.iter(|| {
                i = (i + 1) % tenants.len();
                engine.expand(black_box(t), black_box(&tenants[i]))
            })
        });
    }

    // 누락 플레이스홀더
    let engine = TemplateEngine::with_defaults(Arc::new(PipelineContext::new(1000))).unwrap();
    let empty = Map::new();
    group.bench_function("missing", |b| {
        b.iter(|| engine.expand(black_box(NESTED), black_box(&empty)))
    });

    group.finish();
}

fn bench_route_for(c: &mut Criterion) {
    let table = RoutingTable::from_value(&json!({
        "auth": (0..200)
            .map(|i| json!({ "flag": format!("FLAG_{i}"), "path": format!("auth/{i}/{{date:yyyy-MM-dd}}.log") }))
            .collect::<Vec<_>>()
    }));
    let resolver = RouteResolver::new(table, Arc::new(PipelineContext::new(1000)));

    let mut group = c.benchmark_group("route_for");
    group.throughput(Throughput::Elements(1));
    group.bench_function("configured", |b| {
        b.iter(|| resolver.route_for(black_box("flag_42")))
    });
    group.bench_function("fallback", |b| {
        b.iter(|| resolver.route_for(black_box("NOT_CONFIGURED")))
    });
    group.finish();
}

criterion_group!(benches, bench_expand, bench_route_for);
criterion_main!(benches);
