use super::*;
use crate::distance::Metric;
use crate::index::hnsw::HnswParams;
use crate::index::ivf_pq::{IvfPqBuildParams, IvfPqSearchParams};

fn hnsw_params() -> HnswParams {
    HnswParams {
        dim: 4,
        metric: Metric::L2,
        max_connections: 8,
        ef_construction: 32,
        alpha: 1.0,
        max_elements: 64,
        is_vector_normed: false,
    }
}

#[test]
fn hnsw_handle_reports_its_index_type_and_ntotal() {
    let hnsw = HnswIndex::new(hnsw_params());
    hnsw.add(&[1.0, 0.0, 0.0, 0.0]).expect("add");
    let handle = Index::Hnsw(hnsw);
    assert_eq!(handle.index_type(), IndexType::FaissHNSW);
    assert_eq!(handle.ntotal(), 1);
    assert!(handle.as_hnsw().is_ok());
}

#[test]
fn ivf_pq_handle_rejects_hnsw_downcast() {
    let params = IvfPqBuildParams {
        dim: 4,
        metric: Metric::L2,
        nlist: 1,
        m: 2,
        nbits: 4,
        by_residual: false,
        min_rows_per_cluster: 1,
        kmeans_iterations: 2,
        is_vector_normed: false,
    };
    let search = IvfPqSearchParams {
        nprobe: 1,
        max_codes: 0,
        parallel_mode: 0,
        range_search_confidence: 0.0,
    };
    let ivf = IvfPqIndex::new(params, search);
    let handle = Index::IvfPq(ivf);
    assert_eq!(handle.index_type(), IndexType::FaissIVFPQ);
    assert!(handle.as_hnsw().is_err());
}

#[test]
fn cache_weight_grows_with_ntotal() {
    let empty = Index::Hnsw(HnswIndex::new(hnsw_params()));
    let hnsw = HnswIndex::new(hnsw_params());
    hnsw.add(&[0.0, 1.0, 0.0, 0.0]).expect("add");
    let populated = Index::Hnsw(hnsw);
    assert!(populated.cache_weight() > empty.cache_weight());
}
