//! Benchmark suite for `vindex-core` search operations.
//!
//! Run with: `cargo bench --all-features`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vindex_core::distance::{self, Metric};
use vindex_core::index::hnsw::{HnswIndex, HnswParams};

fn generate_random_vector(dim: usize, seed: usize) -> Vec<f32> {
    (0..dim).map(|i| ((i + seed) as f32 * 0.1).sin()).collect()
}

fn bench_vector_distance(c: &mut Criterion) {
    let dim = 768;
    let vec_a = generate_random_vector(dim, 0);
    let vec_b = generate_random_vector(dim, 1);

    c.bench_function("cosine_distance_768d", |b| {
        b.iter(|| black_box(Metric::CosineDistance.calculate(&vec_a, &vec_b)));
    });

    c.bench_function("euclidean_distance_768d", |b| {
        b.iter(|| black_box(Metric::L2.calculate(&vec_a, &vec_b)));
    });
}

fn bench_vector_normalization(c: &mut Criterion) {
    let dim = 768;
    let vec = generate_random_vector(dim, 0);

    c.bench_function("normalize_768d", |b| {
        b.iter(|| {
            let mut owned = vec.clone();
            distance::normalize_in_place(&mut owned);
            black_box(owned)
        });
    });
}

fn bench_hnsw_search(c: &mut Criterion) {
    let dim = 128;
    let params = HnswParams {
        dim,
        metric: Metric::L2,
        max_connections: 16,
        ef_construction: 100,
        alpha: 1.0,
        max_elements: 2048,
        is_vector_normed: false,
    };
    let index = HnswIndex::new(params);
    for i in 0..2000 {
        index.add(&generate_random_vector(dim, i)).expect("add");
    }
    let query = generate_random_vector(dim, 4242);

    c.bench_function("hnsw_search_top10_2000x128", |b| {
        b.iter(|| black_box(index.search(&query, 10, 64, None).expect("search")));
    });
}

criterion_group!(benches, bench_vector_distance, bench_vector_normalization, bench_hnsw_search);
criterion_main!(benches);
