//! Benchmarks for value encoding and decoding

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};
use typed_redis_cache::{JsonCodec, ValueCodec};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

impl User {
    fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("User {id}"),
            email: format!("user{id}@example.com"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Blob {
    data: String,
}

/// Benchmark struct round-trips through the default codec
fn bench_user_round_trip(c: &mut Criterion) {
    let codec = JsonCodec;
    let user = User::new(123);
    let encoded = codec.serialize(&user).unwrap();

    let mut group = c.benchmark_group("codec_user");

    group.bench_function("serialize", |b| {
        b.iter(|| black_box(codec.serialize(black_box(&user)).unwrap()));
    });

    group.bench_function("deserialize", |b| {
        b.iter(|| black_box(codec.deserialize::<User>(black_box(&encoded)).unwrap()));
    });

    group.finish();
}

/// Benchmark payloads of different sizes
fn bench_payload_sizes(c: &mut Criterion) {
    let codec = JsonCodec;

    let mut group = c.benchmark_group("codec_size");

    for size in &[100usize, 1024, 10240] {
        let blob = Blob {
            data: "x".repeat(*size),
        };
        let encoded = codec.serialize(&blob).unwrap();

        group.bench_with_input(
            BenchmarkId::new("serialize", size),
            &blob,
            |b, blob| {
                b.iter(|| black_box(codec.serialize(black_box(blob)).unwrap()));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("deserialize", size),
            &encoded,
            |b, encoded| {
                b.iter(|| black_box(codec.deserialize::<Blob>(black_box(encoded)).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_user_round_trip, bench_payload_sizes);
criterion_main!(benches);
