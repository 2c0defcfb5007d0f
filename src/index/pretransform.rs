//! Pre-transform chain (C7/§9 design notes): an ordered sequence of pure
//! query/vector transforms wrapping an inner index.
//!
//! The only transform this crate implements is L2-normalization, installed
//! when an index's metric is cosine and `is_vector_normed` is `false`
//! (§4.6). [`IvfPqPreTransformIndex`] is the codec-visible wrapper that
//! corresponds to the on-disk `IxPT` variant (§4.5); [`HnswIndex`] performs
//! the same normalization internally rather than through this chain, since
//! its on-disk representation carries no separate pre-transform body.

use crate::distance::{self, Metric};
use crate::error::Result;
use crate::id_filter::IdFilter;
use crate::index::ivf_pq::{IvfPqIndex, IvfPqSearchParams};

/// A single pure transform applied to a vector on the way into the inner
/// index.
pub trait PreTransform: Send + Sync {
    /// Returns the transformed vector.
    fn apply(&self, v: &[f32]) -> Vec<f32>;
    /// The transform's on-disk/codec tag.
    fn kind(&self) -> PreTransformKind;
}

/// Tag identifying a concrete [`PreTransform`] for the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreTransformKind {
    /// L2-normalizes the vector to unit length.
    L2Normalize,
}

/// L2-normalizes every vector to unit length; the cosine-similarity adapter
/// installs this when indexed vectors are not already known to be
/// unit-norm.
#[derive(Debug, Clone, Copy, Default)]
pub struct L2NormalizeTransform;

impl PreTransform for L2NormalizeTransform {
    fn apply(&self, v: &[f32]) -> Vec<f32> {
        let mut out = v.to_vec();
        distance::normalize_in_place(&mut out);
        out
    }

    fn kind(&self) -> PreTransformKind {
        PreTransformKind::L2Normalize
    }
}

/// An ordered chain of [`PreTransform`]s, traversed left-to-right on the way
/// into the inner index.
#[derive(Default)]
pub struct PreTransformChain {
    transforms: Vec<Box<dyn PreTransform>>,
}

impl PreTransformChain {
    /// Builds a chain from `transforms`, applied in order.
    #[must_use]
    pub fn new(transforms: Vec<Box<dyn PreTransform>>) -> Self {
        Self { transforms }
    }

    /// Applies every transform in the chain, in order, to `v`.
    #[must_use]
    pub fn apply(&self, v: &[f32]) -> Vec<f32> {
        let mut owned = v.to_vec();
        for t in &self.transforms {
            owned = t.apply(&owned);
        }
        owned
    }

    /// Whether this chain has no transforms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// The chain's transform kinds, in order, for the codec.
    #[must_use]
    pub fn kinds(&self) -> Vec<PreTransformKind> {
        self.transforms.iter().map(|t| t.kind()).collect()
    }

    /// Rebuilds a chain from a sequence of kinds (codec read path).
    #[must_use]
    pub fn from_kinds(kinds: &[PreTransformKind]) -> Self {
        let transforms = kinds
            .iter()
            .map(|k| -> Box<dyn PreTransform> {
                match k {
                    PreTransformKind::L2Normalize => Box::new(L2NormalizeTransform),
                }
            })
            .collect();
        Self { transforms }
    }
}

/// An IVF-PQ index wrapped in a pre-transform chain (the `IxPT` codec
/// variant): queries and indexed vectors are transformed on the way in, and
/// result distances are converted back to the caller-facing metric's native
/// units exactly as the bare [`IvfPqIndex`] would if it natively supported
/// cosine.
pub struct IvfPqPreTransformIndex {
    chain: PreTransformChain,
    metric: Metric,
    inner: Box<IvfPqIndex>,
}

impl IvfPqPreTransformIndex {
    /// Wraps `inner` (trained in L2 space over pre-transformed vectors) with
    /// `chain`, reporting results in `metric`'s native units.
    #[must_use]
    pub fn new(chain: PreTransformChain, metric: Metric, inner: Box<IvfPqIndex>) -> Self {
        Self { chain, metric, inner }
    }

    /// The wrapped pre-transform chain, for the codec writer.
    #[must_use]
    pub const fn chain(&self) -> &PreTransformChain {
        &self.chain
    }

    /// The wrapped inner index, for the codec writer.
    #[must_use]
    pub const fn inner(&self) -> &IvfPqIndex {
        &self.inner
    }

    /// Mutable access to the wrapped inner index, for `add_with_ids`.
    pub fn inner_mut(&mut self) -> &mut IvfPqIndex {
        &mut self.inner
    }

    /// Adds `n` pre-transformed rows under `ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the inner index hasn't been trained yet.
    pub fn add_with_ids(&mut self, rows: &[f32], n: usize, ids: &[i64]) -> Result<()> {
        let dim = self.inner.build_params().dim;
        let mut transformed = Vec::with_capacity(rows.len());
        for i in 0..n {
            transformed.extend(self.chain.apply(&rows[i * dim..(i + 1) * dim]));
        }
        self.inner.add_with_ids(&transformed, n, ids)
    }

    fn report_distance(&self, l2_sq: f32) -> f32 {
        match self.metric {
            Metric::CosineSimilarity => distance::l2_to_cosine_similarity(l2_sq),
            Metric::CosineDistance => 1.0 - distance::l2_to_cosine_similarity(l2_sq),
            _ => l2_sq,
        }
    }

    /// Top-`k` search for a single (untransformed) query.
    ///
    /// # Errors
    ///
    /// Returns an error if `query.len()` doesn't match the inner index's
    /// dimension.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        search: &IvfPqSearchParams,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        let transformed = self.chain.apply(query);
        let raw = self.inner.search(&transformed, k, search, filter)?;
        Ok(raw
            .into_iter()
            .map(|(id, d)| (id, if id < 0 { d } else { self.report_distance(d) }))
            .collect())
    }

    /// Range search for a single (untransformed) query; `radius` is in the
    /// caller-facing metric's own units and is converted to a squared-L2
    /// radius before delegating to the inner index.
    ///
    /// # Errors
    ///
    /// Returns an error if `query.len()` doesn't match the inner index's
    /// dimension, or if `radius` fails the cosine-threshold range check.
    pub fn range_search(
        &self,
        query: &[f32],
        radius: f32,
        search: &IvfPqSearchParams,
        limit: i64,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        let transformed = self.chain.apply(query);
        let l2_radius = match self.metric {
            Metric::CosineSimilarity => distance::cosine_threshold_to_l2_radius(radius)?,
            _ => radius,
        };
        let raw = self
            .inner
            .range_search(&transformed, l2_radius, search, limit, filter)?;
        Ok(raw
            .into_iter()
            .map(|(id, d)| (id, self.report_distance(d)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ivf_pq::IvfPqBuildParams;

    fn build_cosine_index() -> IvfPqPreTransformIndex {
        let params = IvfPqBuildParams {
            dim: 4,
            metric: Metric::CosineSimilarity,
            nlist: 2,
            m: 2,
            nbits: 4,
            by_residual: false,
            min_rows_per_cluster: 1,
            kmeans_iterations: 3,
            is_vector_normed: false,
        };
        let search = IvfPqSearchParams {
            nprobe: 2,
            max_codes: 0,
            parallel_mode: 0,
            range_search_confidence: 0.0,
        };
        let mut inner = Box::new(IvfPqIndex::new(params, search));
        let rows: Vec<f32> = vec![
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.9, 0.1, 0.0, 0.0, 0.0, 0.9, 0.1, 0.0,
        ];
        let normalized: Vec<f32> = (0..4)
            .flat_map(|i| {
                let row = &rows[i * 4..(i + 1) * 4];
                let mut out = row.to_vec();
                distance::normalize_in_place(&mut out);
                out
            })
            .collect();
        inner.train(&normalized, 4);
        let chain = PreTransformChain::new(vec![Box::new(L2NormalizeTransform)]);
        let mut wrapped = IvfPqPreTransformIndex::new(chain, Metric::CosineSimilarity, inner);
        wrapped.add_with_ids(&rows, 4, &[10, 11, 12, 13]).expect("add");
        wrapped
    }

    #[test]
    fn search_normalizes_query_and_reports_cosine_similarity() {
        let index = build_cosine_index();
        let search = IvfPqSearchParams {
            nprobe: 2,
            max_codes: 0,
            parallel_mode: 0,
            range_search_confidence: 0.0,
        };
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, &search, None).expect("search");
        assert_eq!(results.len(), 1);
        assert!(results[0].1 > 0.9, "expected near-unit cosine similarity, got {}", results[0].1);
    }

    #[test]
    fn chain_kinds_round_trip() {
        let chain = PreTransformChain::new(vec![Box::new(L2NormalizeTransform)]);
        let kinds = chain.kinds();
        assert_eq!(kinds, vec![PreTransformKind::L2Normalize]);
        let rebuilt = PreTransformChain::from_kinds(&kinds);
        assert!(!rebuilt.is_empty());
    }
}
