//! HNSW adapter (C6): wraps the native graph engine with the crate-wide
//! metric adapter, optional custom-id mapping, and id-filtered search.
//!
//! The native graph ([`native::NativeHnsw`]) only ever sees an ascending
//! ("smaller is closer") distance space. [`Metric::CosineSimilarity`] and
//! [`Metric::CosineDistance`] are realized by L2-normalizing every vector on
//! the way in and running the graph itself in [`Metric::L2`] — the same
//! substrate-metric trick the IVF-PQ engine uses, so both families share one
//! cosine↔L2 adapter (see [`crate::distance`]).

pub mod native;

use parking_lot::RwLock;

use crate::distance::{self, Metric};
use crate::error::{Error, Result};
use crate::id_filter::IdFilter;
use crate::id_map::IdMap;
use crate::meta::{IndexMeta, Section};
use native::{NativeHnsw, SimdDistance};

/// Build-time parameters for an HNSW index.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Vector dimensionality.
    pub dim: usize,
    /// Caller-facing metric (the substrate may differ; see module docs).
    pub metric: Metric,
    /// `M`: max connections per node above layer 0.
    pub max_connections: usize,
    /// Construction-time candidate list size.
    pub ef_construction: usize,
    /// VAMANA diversification factor; `1.0` is standard HNSW.
    pub alpha: f32,
    /// Initial capacity hint.
    pub max_elements: usize,
    /// Whether indexed vectors are already unit-norm (skips normalization).
    pub is_vector_normed: bool,
}

impl HnswParams {
    /// Reads HNSW build parameters out of an [`IndexMeta`], applying the
    /// same defaults as the reference implementation.
    ///
    /// # Errors
    ///
    /// Returns an error if `common.dim`/`common.metric_type` are missing or
    /// malformed.
    pub fn from_meta(meta: &IndexMeta) -> Result<Self> {
        let dim = meta.dim()?;
        let metric = meta.metric()?;
        let max_connections = meta
            .optional::<i64>(Section::Index, "M")?
            .unwrap_or(16)
            .max(2) as usize;
        let ef_construction = meta
            .optional::<i64>(Section::Index, "efConstruction")?
            .unwrap_or(200)
            .max(1) as usize;
        let alpha = meta
            .optional::<f64>(Section::Index, "alpha")?
            .unwrap_or(1.0) as f32;
        let max_elements = meta
            .optional::<i64>(Section::Index, "maxElements")?
            .unwrap_or(1024)
            .max(1) as usize;
        let is_vector_normed = meta.is_vector_normed()?;
        Ok(Self {
            dim,
            metric,
            max_connections,
            ef_construction,
            alpha,
            max_elements,
            is_vector_normed,
        })
    }

    /// The metric the native graph is actually built in.
    const fn substrate_metric(&self) -> Metric {
        if self.metric.needs_normalization() {
            Metric::L2
        } else {
            self.metric
        }
    }

    const fn should_normalize(&self) -> bool {
        self.metric.needs_normalization() && !self.is_vector_normed
    }
}

/// HNSW index: native graph plus the crate-wide metric/id-map adapters.
pub struct HnswIndex {
    params: HnswParams,
    graph: NativeHnsw<SimdDistance>,
    id_map: RwLock<Option<IdMap>>,
}

impl HnswIndex {
    /// Builds an empty HNSW index from `params`.
    #[must_use]
    pub fn new(params: HnswParams) -> Self {
        let engine = SimdDistance::new(params.substrate_metric());
        let graph = NativeHnsw::with_alpha(
            engine,
            params.max_connections,
            params.ef_construction,
            params.max_elements,
            params.alpha,
        );
        Self {
            params,
            graph,
            id_map: RwLock::new(None),
        }
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Whether the index holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    fn prepared(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if vector.len() != self.params.dim {
            return Err(Error::DimensionMismatch {
                expected: self.params.dim,
                actual: vector.len(),
            });
        }
        let mut owned = vector.to_vec();
        if self.params.should_normalize() {
            distance::normalize_in_place(&mut owned);
        }
        Ok(owned)
    }

    /// Adds `vector`, assigning it the next sequential internal/external id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `vector.len() != dim`, or
    /// [`Error::InvalidState`] if the index already uses custom row ids.
    pub fn add(&self, vector: &[f32]) -> Result<i64> {
        if self.id_map.read().is_some() {
            return Err(Error::InvalidState(
                "index uses custom row ids; call add_with_id".to_string(),
            ));
        }
        let owned = self.prepared(vector)?;
        let node = self.graph.insert(owned);
        Ok(node as i64)
    }

    /// Adds `vector` under caller-supplied `external_id`, building the
    /// internal id map lazily on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `vector.len() != dim`.
    pub fn add_with_id(&self, vector: &[f32], external_id: i64) -> Result<()> {
        let owned = self.prepared(vector)?;
        let mut id_map = self.id_map.write();
        let map = id_map.get_or_insert_with(IdMap::new);
        let node = self.graph.insert(owned);
        debug_assert_eq!(node, map.len(), "internal ids must stay dense");
        map.push(external_id);
        Ok(())
    }

    fn to_external(&self, node: usize) -> i64 {
        match self.id_map.read().as_ref() {
            Some(map) => map.to_external(node).unwrap_or(node as i64),
            None => node as i64,
        }
    }

    /// Returns the `k` nearest neighbors of `query`, optionally restricted
    /// to ids accepted by `filter`.
    ///
    /// When a filter is supplied, the candidate pool is widened past
    /// `ef_search` and the result truncated to `k` after filtering; this is
    /// a best-effort widening, not a guarantee of exactly `k` results under
    /// a highly selective filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `query.len() != dim`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        let owned = self.prepared(query)?;
        let widened_ef = match filter {
            Some(_) => ef_search.max(k).saturating_mul(4),
            None => ef_search,
        };
        let raw = self.graph.search(&owned, k.max(widened_ef), widened_ef);
        let mut out = Vec::with_capacity(k);
        for (node, dist) in raw {
            let external = self.to_external(node);
            if filter.is_some_and(|f| !f.is_member(external)) {
                continue;
            }
            out.push((external, self.report_distance(dist)));
            if out.len() == k {
                break;
            }
        }
        Ok(out)
    }

    /// Range search with no `k` limit: every indexed vector within
    /// `threshold` of `query` (in the caller-facing metric's own units) and
    /// accepted by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] if the index's metric doesn't support
    /// range search (inner product), or [`Error::DimensionMismatch`] if
    /// `query.len() != dim`.
    pub fn range_search(
        &self,
        query: &[f32],
        threshold: f32,
        max_expansions: usize,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        if !self.params.metric.supports_range_search() {
            return Err(Error::Unsupported(
                "range search is not defined for the inner-product metric".to_string(),
            ));
        }
        let owned = self.prepared(query)?;
        let substrate_radius = if self.params.metric.needs_normalization() {
            distance::cosine_threshold_to_l2_radius(threshold)?
        } else {
            threshold
        };

        let id_map = self.id_map.read();
        let accept = |node: usize| -> bool {
            let external = match id_map.as_ref() {
                Some(map) => map.to_external(node).unwrap_or(node as i64),
                None => node as i64,
            };
            filter.is_none_or(|f| f.is_member(external))
        };

        let raw = self
            .graph
            .range_search(&owned, substrate_radius, max_expansions, &accept);
        Ok(raw
            .into_iter()
            .map(|(node, dist)| {
                (
                    self.to_external_locked(&id_map, node),
                    self.report_distance(dist),
                )
            })
            .collect())
    }

    fn to_external_locked(&self, id_map: &Option<IdMap>, node: usize) -> i64 {
        match id_map.as_ref() {
            Some(map) => map.to_external(node).unwrap_or(node as i64),
            None => node as i64,
        }
    }

    /// Converts a substrate-space ascending distance back to the
    /// caller-facing metric's native units.
    fn report_distance(&self, ascending: f32) -> f32 {
        match self.params.metric {
            Metric::L2 => ascending,
            Metric::CosineSimilarity => distance::l2_to_cosine_similarity(ascending),
            Metric::CosineDistance => 1.0 - distance::l2_to_cosine_similarity(ascending),
            Metric::InnerProduct => -ascending,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
