//! Benchmarks for alert evaluation and cycle throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mofo::{
    evaluate, AlertState, MemoryTransport, Monitor, Publisher, ScriptedSource, SensorSample,
    ThresholdConfig, ThresholdStore,
};
use std::sync::Arc;

fn generate_samples(count: usize) -> Vec<SensorSample> {
    (0..count)
        .map(|i| {
            let humidity = 55.0 + (i % 10) as f32;
            SensorSample::new(humidity, 320 + (i % 60) as u16)
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let samples = generate_samples(1000);
    let thresholds = ThresholdConfig::default();

    group.throughput(Throughput::Elements(1000));

    group.bench_function("pure_1000_samples", |b| {
        b.iter(|| {
            let mut count = 0;
            for s in &samples {
                count = evaluate(s, &thresholds, count).0;
            }
            black_box(count);
        })
    });

    group.bench_function("stateful_1000_samples", |b| {
        b.iter(|| {
            let mut state = AlertState::new();
            for s in &samples {
                black_box(state.observe(s, &thresholds));
            }
        })
    });

    group.finish();
}

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");
    let samples = generate_samples(1000);

    group.throughput(Throughput::Elements(1000));

    group.bench_function("run_1000_cycles", |b| {
        b.iter(|| {
            let mut source = ScriptedSource::new();
            for s in &samples {
                source.push(*s);
            }
            let mut monitor = Monitor::new(
                source,
                Publisher::new(MemoryTransport::with_buffer_size(4096)),
                Arc::new(ThresholdStore::new()),
            );
            for _ in 0..samples.len() {
                black_box(monitor.run_cycle());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_cycle);
criterion_main!(benches);
