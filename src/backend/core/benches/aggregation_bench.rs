//! Benchmarks for instance grouping, live merging and statistics.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mindcraft_core::engine::AggregationEngine;
use mindcraft_core::events::{group_by_subject, sort_by_time, Event};
use mindcraft_core::processors::{ProbMatchProcessor, ProcessorRegistry};
use mindcraft_core::state::LiveStateStore;
use serde_json::json;

fn build_events(n: usize, subjects: usize) -> Vec<Event> {
    (0..n)
        .map(|i| {
            let subject = (i % subjects) as i64;
            Event::new("ProbMatch", subject, "ButtonPress", (n - i) as i64)
                .with_args(json!({ "left": i % 3 == 0 }))
        })
        .collect()
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_by_subject");
    for size in [100, 1_000, 10_000] {
        let events = build_events(size, 50);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| black_box(group_by_subject(events.clone())));
        });
    }
    group.finish();
}

fn bench_time_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_by_time");
    for size in [100, 1_000, 10_000] {
        let events = build_events(size, 1);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| black_box(sort_by_time(events)));
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_incoming_event");
    group.sample_size(20);
    for history in [0, 1_000, 10_000] {
        let events = build_events(history, 100);
        group.bench_with_input(BenchmarkId::new("history", history), &events, |b, events| {
            let store = LiveStateStore::new();
            store.initialize(Vec::new(), vec![("ProbMatch".into(), events.clone())]);
            let mut time = 0;
            b.iter(|| {
                time += 1;
                black_box(store.merge_incoming_event(Event::new("ProbMatch", 7, "ButtonPress", time)))
            });
        });
    }
    group.finish();
}

fn bench_global_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_global");
    for size in [1_000, 10_000] {
        let store = Arc::new(LiveStateStore::new());
        store.initialize(Vec::new(), vec![("ProbMatch".into(), build_events(size, 100))]);
        let registry = ProcessorRegistry::new();
        registry.register("ProbMatch", Arc::new(ProbMatchProcessor::new()));
        let engine = AggregationEngine::new(store, registry);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &engine, |b, engine| {
            b.iter(|| black_box(engine.compute_global("ProbMatch")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grouping, bench_time_sort, bench_merge, bench_global_stats);
criterion_main!(benches);
