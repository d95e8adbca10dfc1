//! Criterion micro-benchmarks for chunk-ledger placement and bookkeeping.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use smem_alloc::{AllocRequest, RegionAllocator};
use smem_bench::fragmented_sim;
use smem_core::{RegionSet, MIB};
use smem_test_utils::fixtures::{reference_sim, REGION_A, REGION_B, REGION_C};

fn anywhere() -> RegionSet {
    [REGION_A, REGION_B, REGION_C].into_iter().collect()
}

/// Benchmark: alloc + free of one 8 MiB buffer on an empty allocator.
fn bench_alloc_free_empty(c: &mut Criterion) {
    let mut sim = reference_sim();
    let set = anywhere();
    c.bench_function("alloc_free_empty", |b| {
        b.iter(|| {
            let h = sim
                .alloc(&AllocRequest::new("bench", black_box(8 * MIB), &set))
                .unwrap();
            sim.free(h).unwrap();
        });
    });
}

/// Benchmark: the same cycle with first-fit skipping holes.
fn bench_alloc_free_fragmented(c: &mut Criterion) {
    let (mut sim, _live) = fragmented_sim(42);
    let set = anywhere();
    c.bench_function("alloc_free_fragmented", |b| {
        b.iter(|| {
            let h = sim
                .alloc(&AllocRequest::new("bench", black_box(4 * MIB), &set))
                .unwrap();
            sim.free(h).unwrap();
        });
    });
}

/// Benchmark: full ownership cross-check of a fragmented allocator.
fn bench_verify(c: &mut Criterion) {
    let (sim, _live) = fragmented_sim(42);
    c.bench_function("verify_fragmented", |b| {
        b.iter(|| black_box(sim.verify()));
    });
}

/// Benchmark: render the text memory map.
fn bench_memory_map(c: &mut Criterion) {
    let (sim, _live) = fragmented_sim(42);
    c.bench_function("memory_map_fragmented", |b| {
        b.iter(|| black_box(sim.ledger().to_string()));
    });
}

criterion_group!(
    benches,
    bench_alloc_free_empty,
    bench_alloc_free_fragmented,
    bench_verify,
    bench_memory_map
);
criterion_main!(benches);
