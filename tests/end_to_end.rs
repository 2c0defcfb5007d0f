//! End-to-end tests exercising the full builder -> writer -> reader ->
//! searcher lifecycle for both index families, including on-disk
//! round-trips and id-filtered search.

use vindex_core::{
    contract, Error, IndexFamily, IndexMeta, IndexType, Section,
};
use vindex_core::distance::Metric;
use vindex_core::id_filter::{ArrayFilter, RangeFilter};
use vindex_core::vector_view::{FixedArrayView, VectorColumn};

fn generate_rows(count: usize, dim: usize) -> Vec<f32> {
    (0..count)
        .flat_map(|i| (0..dim).map(move |d| ((i * 7 + d * 3) % 23) as f32 / 23.0))
        .collect()
}

/// Four well-separated clusters, so a small `nlist` trains cleanly and the
/// reconstruction-error bound has a real, non-degenerate radius to work with.
fn clustered_rows(count: usize, dim: usize) -> Vec<f32> {
    let mut rows = Vec::with_capacity(count * dim);
    for i in 0..count {
        let cluster = (i % 4) as f32 * 10.0;
        for d in 0..dim {
            rows.push(cluster + (d as f32) * 0.1 + (i as f32 % 3.0) * 0.01);
        }
    }
    rows
}

fn ivf_pq_meta(dim: i64, nlist: i64) -> IndexMeta {
    let mut meta = IndexMeta::new(IndexFamily::Vector, IndexType::FaissIVFPQ);
    meta.set(Section::Common, "dim", dim);
    meta.set(Section::Common, "metric_type", Metric::L2);
    meta.set(Section::Index, "nlist", nlist);
    meta.set(Section::Index, "M", 4i64);
    meta.set(Section::Index, "nbits", 4i64);
    meta.set(Section::Index, "minRowsPerCluster", 1i64);
    meta.set(Section::Search, "nprobe", nlist);
    meta
}

fn hnsw_meta(dim: i64) -> IndexMeta {
    let mut meta = IndexMeta::new(IndexFamily::Vector, IndexType::FaissHNSW);
    meta.set(Section::Common, "dim", dim);
    meta.set(Section::Common, "metric_type", Metric::L2);
    meta.set(Section::Index, "M", 16i64);
    meta.set(Section::Index, "efConstruction", 100i64);
    meta.set(Section::Index, "maxElements", 1024i64);
    meta
}

#[test]
fn ivf_pq_round_trips_through_disk_and_searches() {
    let dim = 8usize;
    let n = 64usize;
    let rows = clustered_rows(n, dim);
    let view = FixedArrayView::new(&rows, dim, n).expect("view");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ivfpq.bin");

    let meta = ivf_pq_meta(dim as i64, 4);
    let mut builder = contract::create_builder(meta.clone()).expect("builder");
    builder.open_path(&path).expect("open");
    builder
        .add(VectorColumn::Fixed(view), None, None)
        .expect("add");
    builder.flush(false, None).expect("flush");

    assert!(path.exists());

    let mut searcher = contract::create_searcher(meta).expect("searcher");
    searcher.read_index(&path).expect("read_index");

    let query = &rows[8..16]; // row 1
    let results = searcher.search(query, 1, None).expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, 1);
    assert!(results[0].1 < 1e-3);

    let filter = RangeFilter::new(10, n as i64, true).expect("range filter");
    let filtered = searcher
        .search(query, 5, Some(&filter as &dyn vindex_core::IdFilter))
        .expect("filtered search");
    assert!(filtered.iter().all(|(id, _)| *id >= 10));
}

#[test]
fn ivf_pq_range_search_respects_confidence_monotonicity() {
    let dim = 8usize;
    let n = 200usize;
    let radius = 2.0f32;

    let mut low_meta = ivf_pq_meta(dim as i64, 8);
    low_meta.set(Section::Search, "range_search_confidence", 0.0f64);
    let mut high_meta = ivf_pq_meta(dim as i64, 8);
    high_meta.set(Section::Search, "range_search_confidence", 1.0f64);

    // Two independently-trained indexes over the same rows at the two
    // extremes of the confidence range: alpha=0 is pure ADC distance,
    // alpha=1 is the fully relaxed reconstruction-error lower bound, which
    // only ever admits a superset of what alpha=0 admits (§4.4.3).
    let rebuild = |m: IndexMeta| {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("idx.bin");
        let mut b = contract::create_builder(m.clone()).expect("builder");
        b.open_path(&path).expect("open");
        let rows = clustered_rows(n, dim);
        let view = FixedArrayView::new(&rows, dim, n).expect("view");
        b.add(VectorColumn::Fixed(view), None, None).expect("add");
        b.flush(false, None).expect("flush");
        let mut s = contract::create_searcher(m).expect("searcher");
        s.read_index(&path).expect("read_index");
        (s, dir)
    };

    let (low_searcher, _low_dir) = rebuild(low_meta);
    let (high_searcher, _high_dir) = rebuild(high_meta);

    let query = &clustered_rows(n, dim)[0..dim];
    let low = low_searcher.range_search(query, radius, -1, None).expect("low range search");
    let high = high_searcher.range_search(query, radius, -1, None).expect("high range search");

    use std::collections::HashSet;
    let low_ids: HashSet<i64> = low.iter().map(|&(id, _)| id).collect();
    let high_ids: HashSet<i64> = high.iter().map(|&(id, _)| id).collect();
    assert!(
        low_ids.is_subset(&high_ids),
        "alpha=0 result set must be a subset of alpha=1's (monotone recall in alpha)"
    );
    assert!(high.len() >= low.len());
}

#[test]
fn hnsw_searcher_supports_custom_row_ids_and_array_filter() {
    // HNSW has no on-disk wire format in this crate (§ module docs on
    // `codec`): a handle only ever leaves the builder through the index
    // cache, keyed by `extra.custom_cache_key`, and the searcher resolves
    // the same key on `read_index` without ever touching `codec::read_index`.
    let dim = 4usize;
    let n = 20usize;
    let rows = generate_rows(n, dim);
    let view = FixedArrayView::new(&rows, dim, n).expect("view");
    let row_ids: Vec<i64> = (0..n as i64).map(|i| 1000 + i).collect();

    let mut meta = hnsw_meta(dim as i64);
    meta.set(Section::Extra, "use_custom_row_id", true);
    meta.set(Section::Extra, "custom_cache_key", "hnsw-custom-ids");
    meta.set(Section::Extra, "cache_index_file", true);

    let mut builder = contract::create_builder(meta.clone()).expect("builder");
    builder.open().expect("open");
    builder
        .add(VectorColumn::Fixed(view), Some(&row_ids), None)
        .expect("add");
    builder.flush(true, None).expect("flush into cache");

    let mut searcher = contract::create_searcher(meta).expect("searcher");
    searcher
        .read_index(std::path::PathBuf::from("unused-cache-only-key"))
        .expect("read from cache");

    let query = &rows[0..dim];
    let allow = ArrayFilter::new(vec![1000, 1005, 1010]);
    let results = searcher
        .search(query, 3, Some(&allow as &dyn vindex_core::IdFilter))
        .expect("search");
    assert!(!results.is_empty());
    assert!(results.iter().all(|(id, _)| [1000, 1005, 1010].contains(id)));
}

#[test]
fn builder_rejects_operations_out_of_state() {
    let meta = hnsw_meta(4);
    let mut builder = contract::create_builder(meta).expect("builder");
    let rows = generate_rows(1, 4);
    let view = FixedArrayView::new(&rows, 4, 1).expect("view");
    let err = builder
        .add(VectorColumn::Fixed(view), None, None)
        .expect_err("add before open must fail");
    assert!(matches!(err, Error::InvalidState(_)));
}
