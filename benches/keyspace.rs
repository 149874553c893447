//! Benchmarks for key rewriting
//!
//! Every facade call rewrites its key, so merge cost lands on every
//! operation's hot path.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use typed_redis_cache::Keyspace;

fn bench_merge(c: &mut Criterion) {
    let prefixed = Keyspace::new("orders");
    let bare = Keyspace::none();

    let mut group = c.benchmark_group("keyspace");

    group.bench_function("merge_prefixed", |b| {
        b.iter(|| black_box(prefixed.merge(black_box("customer:42:basket"))));
    });

    group.bench_function("merge_passthrough", |b| {
        b.iter(|| black_box(bare.merge(black_box("customer:42:basket"))));
    });

    group.finish();
}

fn bench_key_lengths(c: &mut Criterion) {
    let keyspace = Keyspace::new("orders");

    let mut group = c.benchmark_group("keyspace_length");

    for length in &[8usize, 64, 512] {
        let key = "k".repeat(*length);
        group.bench_with_input(BenchmarkId::from_parameter(length), &key, |b, key| {
            b.iter(|| black_box(keyspace.merge(black_box(key))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge, bench_key_lengths);
criterion_main!(benches);
