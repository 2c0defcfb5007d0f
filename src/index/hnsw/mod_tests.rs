use super::*;
use crate::id_filter::{ArrayFilter, RangeFilter};

fn params(metric: Metric) -> HnswParams {
    HnswParams {
        dim: 8,
        metric,
        max_connections: 8,
        ef_construction: 64,
        alpha: 1.0,
        max_elements: 64,
        is_vector_normed: false,
    }
}

fn vec_at(seed: usize) -> Vec<f32> {
    (0..8).map(|j| (seed * 8 + j) as f32).collect()
}

#[test]
fn sequential_ids_round_trip() {
    let idx = HnswIndex::new(params(Metric::L2));
    for i in 0..20 {
        idx.add(&vec_at(i)).unwrap();
    }
    assert_eq!(idx.len(), 20);
    let results = idx.search(&vec_at(0), 5, 50, None).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].0, 0);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let idx = HnswIndex::new(params(Metric::L2));
    let err = idx.add(&[1.0, 2.0]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));
}

#[test]
fn custom_ids_are_remapped_on_search() {
    let idx = HnswIndex::new(params(Metric::L2));
    for i in 0..10 {
        idx.add_with_id(&vec_at(i), 1000 + i as i64).unwrap();
    }
    let results = idx.search(&vec_at(0), 3, 50, None).unwrap();
    assert_eq!(results[0].0, 1000);
}

#[test]
fn cosine_metric_normalizes_and_converts_range_threshold() {
    let idx = HnswIndex::new(params(Metric::CosineSimilarity));
    idx.add(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
    idx.add(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
    idx.add(&[2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap(); // same direction as id 0

    // threshold 0.99 cosine similarity: only near-parallel vectors qualify.
    let hits = idx
        .range_search(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 0.99, 100, None)
        .unwrap();
    let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
    assert!(ids.contains(&0));
    assert!(ids.contains(&2));
    assert!(!ids.contains(&1));
}

#[test]
fn inner_product_rejects_range_search() {
    let idx = HnswIndex::new(params(Metric::InnerProduct));
    idx.add(&vec_at(0)).unwrap();
    let err = idx.range_search(&vec_at(0), 1.0, 10, None).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn search_honors_id_filter() {
    let idx = HnswIndex::new(params(Metric::L2));
    for i in 0..30 {
        idx.add(&vec_at(i)).unwrap();
    }
    let filter = RangeFilter::new(10, 15, false).unwrap();
    let results = idx.search(&vec_at(0), 3, 50, Some(&filter)).unwrap();
    assert!(results.iter().all(|(id, _)| (10..=15).contains(id)));
}

#[test]
fn range_search_honors_id_filter() {
    let idx = HnswIndex::new(params(Metric::L2));
    for i in 0..30 {
        idx.add(&vec_at(i)).unwrap();
    }
    let filter = ArrayFilter::new(vec![0, 1, 2]);
    let hits = idx
        .range_search(&vec_at(0), 10_000.0, 1000, Some(&filter))
        .unwrap();
    assert!(hits.iter().all(|(id, _)| [0i64, 1, 2].contains(id)));
}
