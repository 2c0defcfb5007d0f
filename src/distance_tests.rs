//! Tests for `distance` module

use super::distance::*;

#[test]
fn test_cosine_similarity() {
    let a = vec![1.0, 0.0, 0.0];
    let b = vec![1.0, 0.0, 0.0];
    let similarity = Metric::CosineSimilarity.calculate(&a, &b);
    assert!((similarity - 1.0).abs() < 1e-6);

    let c = vec![0.0, 1.0, 0.0];
    let similarity = Metric::CosineSimilarity.calculate(&a, &c);
    assert!(similarity.abs() < 1e-6);
}

#[test]
fn test_l2_distance() {
    let a = vec![0.0, 0.0, 0.0];
    let b = vec![3.0, 4.0, 0.0];
    let d = Metric::L2.calculate(&a, &b);
    assert!((d - 25.0).abs() < 1e-6, "squared L2 should be 25, got {d}");
}

#[test]
fn test_inner_product() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![4.0, 5.0, 6.0];
    let product = Metric::InnerProduct.calculate(&a, &b);
    assert!((product - 32.0).abs() < 1e-6);
}

#[test]
fn test_cosine_distance_complements_similarity() {
    let a = vec![1.0, 0.0];
    let b = vec![0.0, 1.0];
    let sim = Metric::CosineSimilarity.calculate(&a, &b);
    let dist = Metric::CosineDistance.calculate(&a, &b);
    assert!((sim + dist - 1.0).abs() < 1e-6);
}

#[test]
fn test_higher_is_better() {
    assert!(Metric::CosineSimilarity.higher_is_better());
    assert!(Metric::InnerProduct.higher_is_better());
    assert!(!Metric::L2.higher_is_better());
    assert!(!Metric::CosineDistance.higher_is_better());
}

#[test]
fn test_inner_product_rejects_range_search() {
    assert!(!Metric::InnerProduct.supports_range_search());
    assert!(Metric::L2.supports_range_search());
    assert!(Metric::CosineSimilarity.supports_range_search());
}

#[test]
fn test_cosine_threshold_round_trip() {
    let tau = 0.8_f32;
    let radius = cosine_threshold_to_l2_radius(tau).unwrap();
    let back = l2_to_cosine_similarity(radius);
    assert!((back - tau).abs() < 1e-6);
}

#[test]
fn test_cosine_threshold_rejects_out_of_range() {
    assert!(cosine_threshold_to_l2_radius(1.5).is_err());
    assert!(cosine_threshold_to_l2_radius(-1.5).is_err());
}

#[test]
fn test_normalize_in_place() {
    let mut v = vec![3.0, 4.0];
    normalize_in_place(&mut v);
    let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
    assert!((norm - 1.0).abs() < 1e-6);
}

#[test]
fn test_normalize_zero_vector_is_noop() {
    let mut v = vec![0.0, 0.0];
    normalize_in_place(&mut v);
    assert_eq!(v, vec![0.0, 0.0]);
}
