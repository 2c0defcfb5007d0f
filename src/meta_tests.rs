//! Tests for `meta` module

use super::meta::*;
use crate::distance::Metric;

fn sample_meta() -> IndexMeta {
    let mut m = IndexMeta::new(IndexFamily::Vector, IndexType::FaissIVFPQ);
    m.set(Section::Common, "dim", 8_i64);
    m.set(Section::Common, "metric_type", Metric::L2);
    m.set(Section::Index, "nlist", 16_i64);
    m.set(Section::Index, "M", 4_i64);
    m.set(Section::Index, "nbits", 8_i64);
    m.set(Section::Search, "nprobe", 4_i64);
    m
}

#[test]
fn test_required_and_optional() {
    let m = sample_meta();
    assert_eq!(m.dim().unwrap(), 8);
    assert_eq!(m.metric().unwrap(), Metric::L2);
    assert!(!m.is_vector_normed().unwrap());

    let nlist: i64 = m.required(Section::Index, "nlist").unwrap();
    assert_eq!(nlist, 16);

    let missing: Option<i64> = m.optional(Section::Search, "max_codes").unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_missing_required_is_error() {
    let m = IndexMeta::new(IndexFamily::Vector, IndexType::FaissHNSW);
    assert!(m.dim().is_err());
}

#[test]
fn test_rejects_non_positive_dim() {
    let mut m = IndexMeta::new(IndexFamily::Vector, IndexType::FaissHNSW);
    m.set(Section::Common, "dim", 0_i64);
    assert!(m.dim().is_err());
}

#[test]
fn test_msgpack_round_trip() {
    let m = sample_meta();
    let bytes = m.to_msgpack().unwrap();
    let back = IndexMeta::from_msgpack(&bytes).unwrap();
    assert_eq!(back.dim().unwrap(), 8);
    assert_eq!(back.metric().unwrap(), Metric::L2);
    assert_eq!(back.meta_version, IndexMeta::CURRENT_VERSION);
}

#[test]
fn test_json_round_trip() {
    let m = sample_meta();
    let s = m.to_json().unwrap();
    let back = IndexMeta::from_json(&s).unwrap();
    assert_eq!(back.dim().unwrap(), 8);
    assert_eq!(back.index_type, IndexType::FaissIVFPQ);
}

#[test]
fn test_check_integrity() {
    let m = sample_meta();
    assert!(m.check_integrity().is_ok());

    let mut bad = IndexMeta::new(IndexFamily::Vector, IndexType::FaissHNSW);
    bad.set(Section::Common, "dim", 4_i64);
    // missing metric_type
    assert!(bad.check_integrity().is_err());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.bin");
    let m = sample_meta();
    m.write(&path).unwrap();
    let back = IndexMeta::read(&path).unwrap();
    assert_eq!(back.dim().unwrap(), 8);
}
