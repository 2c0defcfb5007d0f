use super::*;

#[test]
fn range_filter_bounds_are_inclusive() {
    let f = RangeFilter::new(10, 20, false).unwrap();
    assert!(f.is_member(10));
    assert!(f.is_member(20));
    assert!(!f.is_member(9));
    assert!(!f.is_member(21));
}

#[test]
fn range_filter_rejects_inverted_bounds() {
    assert!(RangeFilter::new(20, 10, false).is_err());
}

#[test]
fn array_filter_linear_scan() {
    let f = ArrayFilter::new(vec![1, 5, 9]);
    assert!(f.is_member(5));
    assert!(!f.is_member(6));
}

#[test]
fn batch_filter_exact_after_bloom_hit() {
    let ids: Vec<i64> = (0..1000).step_by(3).collect();
    let f = BatchFilter::new(ids.clone());
    for id in &ids {
        assert!(f.is_member(*id));
    }
    assert!(!f.is_member(1)); // not a multiple of 3
}

#[test]
fn bitmap_filter_respects_size() {
    let f = BitmapFilter::new(64, &[3, 10, 40]).unwrap();
    assert!(f.is_member(3));
    assert!(f.is_member(10));
    assert!(!f.is_member(11));
    assert!(!f.is_member(100)); // outside declared size
}

#[test]
fn mapped_filter_evaluates_against_external_id() {
    let mut map = IdMap::new();
    map.push(500);
    map.push(501);
    map.push(502);

    let inner = ArrayFilter::new(vec![501]);
    let mapped = MappedFilter::new(&inner, &map);

    assert!(!mapped.is_member(0)); // internal 0 -> external 500, not in inner
    assert!(mapped.is_member(1)); // internal 1 -> external 501, in inner
}
