//! IVF-PQ engine with reconstruction-error-bounded range search (C7) — the
//! hard part of the crate.
//!
//! Build-time: vectors are routed to their nearest coarse centroid, PQ-coded
//! against the (optionally residualized) coarse centroid, and the per-vector
//! reconstruction error (the L2 norm of the PQ decode residual) is stored
//! list-parallel to the codes (§4.4.1). Search-time: both plain top-k and
//! the reconstruction-error-bounded range search (§4.4.2-3) scan the
//! `nprobe` nearest lists' ADC distance tables.

mod coarse;
mod kmeans;
mod pq;

pub mod invlist;

pub use coarse::CoarseQuantizer;
pub use invlist::{BlockCacheInvertedLists, InMemoryInvertedLists, ListSource};
pub use pq::ProductQuantizer;

use rayon::prelude::*;

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::id_filter::IdFilter;
use crate::id_map::IdMap;
use crate::meta::{IndexMeta, Section};

/// Build-time parameters for an IVF-PQ index.
#[derive(Debug, Clone, Copy)]
pub struct IvfPqBuildParams {
    /// Vector dimensionality.
    pub dim: usize,
    /// Caller-facing metric.
    pub metric: Metric,
    /// Number of coarse (inverted-list) centroids.
    pub nlist: usize,
    /// Number of product-quantizer sub-quantizers.
    pub m: usize,
    /// Bits per sub-code (`2^nbits` centroids per sub-quantizer).
    pub nbits: u32,
    /// Whether PQ codes the residual against the assigned coarse centroid
    /// (`true`, the default) or the raw vector (`false`).
    pub by_residual: bool,
    /// Warn-not-fail precondition divisor: a `tracing::warn!` is emitted at
    /// train time if `nlist * min_rows_per_cluster > ntotal`.
    pub min_rows_per_cluster: usize,
    /// K-means iterations for both the coarse quantizer and each PQ
    /// sub-quantizer.
    pub kmeans_iterations: usize,
    /// Whether indexed vectors are already unit-norm.
    pub is_vector_normed: bool,
}

impl IvfPqBuildParams {
    /// Reads IVF-PQ build parameters out of an [`IndexMeta`].
    ///
    /// # Errors
    ///
    /// Returns an error if required common/index parameters are missing or
    /// malformed.
    pub fn from_meta(meta: &IndexMeta) -> Result<Self> {
        let dim = meta.dim()?;
        let metric = meta.metric()?;
        let nlist: i64 = meta.required(Section::Index, "nlist")?;
        let m: i64 = meta.required(Section::Index, "M")?;
        let nbits: i64 = meta.required(Section::Index, "nbits")?;
        if nlist <= 0 {
            return Err(Error::InvalidParam {
                key: "nlist".to_string(),
                reason: format!("must be > 0, got {nlist}"),
            });
        }
        if m <= 0 || dim % m as usize != 0 {
            return Err(Error::InvalidParam {
                key: "M".to_string(),
                reason: format!("must divide dim {dim} evenly, got {m}"),
            });
        }
        let by_residual = meta
            .optional::<bool>(Section::Index, "by_residual")?
            .unwrap_or(true);
        let min_rows_per_cluster = meta
            .optional::<i64>(Section::Index, "minRowsPerCluster")?
            .unwrap_or(39)
            .max(1) as usize;
        let kmeans_iterations = meta
            .optional::<i64>(Section::Index, "kmeansIterations")?
            .unwrap_or(10)
            .max(1) as usize;
        Ok(Self {
            dim,
            metric,
            nlist: nlist as usize,
            m: m as usize,
            nbits: nbits as u32,
            by_residual,
            min_rows_per_cluster,
            kmeans_iterations,
            is_vector_normed: meta.is_vector_normed()?,
        })
    }
}

/// Per-call (or persisted-default) search parameters.
#[derive(Debug, Clone, Copy)]
pub struct IvfPqSearchParams {
    /// Lists probed per query.
    pub nprobe: usize,
    /// Upper bound on total entries scanned per query; `0` means unbounded.
    pub max_codes: usize,
    /// Parallelism axis: 0 = across queries, 1 = across probes within a
    /// query, 2 = across the flattened `queries x probes` product.
    pub parallel_mode: u8,
    /// Range-search confidence `alpha` in `[0, 1]`; `0` is pure ADC
    /// filtering, `1` is the tightest sound reconstruction-error bound.
    pub range_search_confidence: f32,
}

impl IvfPqSearchParams {
    /// Reads search parameters out of an [`IndexMeta`], applying the same
    /// defaults as the reference implementation.
    ///
    /// # Errors
    ///
    /// Returns an error if present parameters are malformed.
    pub fn from_meta(meta: &IndexMeta) -> Result<Self> {
        let nprobe = meta
            .optional::<i64>(Section::Search, "nprobe")?
            .unwrap_or(1)
            .max(1) as usize;
        let max_codes = meta
            .optional::<i64>(Section::Search, "max_codes")?
            .unwrap_or(0)
            .max(0) as usize;
        let parallel_mode = meta
            .optional::<i64>(Section::Search, "parallel_mode")?
            .unwrap_or(0);
        if !(0..=2).contains(&parallel_mode) {
            return Err(Error::InvalidParam {
                key: "parallel_mode".to_string(),
                reason: format!("must be in [0, 2], got {parallel_mode}"),
            });
        }
        let range_search_confidence = meta
            .optional::<f64>(Section::Search, "range_search_confidence")?
            .unwrap_or(0.0) as f32;
        if !(0.0..=1.0).contains(&range_search_confidence) {
            return Err(Error::InvalidParam {
                key: "range_search_confidence".to_string(),
                reason: format!("must be in [0, 1], got {range_search_confidence}"),
            });
        }
        Ok(Self {
            nprobe,
            max_codes,
            parallel_mode: parallel_mode as u8,
            range_search_confidence,
        })
    }
}

/// A trained (or in-training) IVF-PQ index: coarse quantizer, product
/// quantizer, and the inverted lists holding codes/ids/reconstruction
/// errors for every coded vector.
pub struct IvfPqIndex {
    params: IvfPqBuildParams,
    trained: bool,
    coarse: CoarseQuantizer,
    pq: ProductQuantizer,
    lists: Box<dyn ListSource>,
    ntotal: usize,
    id_map: Option<IdMap>,
    default_search: IvfPqSearchParams,
}

impl IvfPqIndex {
    /// Builds an untrained index shell with empty in-memory lists.
    #[must_use]
    pub fn new(params: IvfPqBuildParams, default_search: IvfPqSearchParams) -> Self {
        let pq = ProductQuantizer::new(params.dim, params.m, params.nbits);
        let lists = InMemoryInvertedLists::new(params.nlist, pq.code_size());
        Self {
            coarse: CoarseQuantizer::new(params.dim, params.nlist),
            pq,
            lists: Box::new(lists),
            params,
            trained: false,
            ntotal: 0,
            id_map: None,
            default_search,
        }
    }

    /// Rebuilds a trained index from codec-read parts: a coarse quantizer,
    /// product quantizer, and inverted lists already matching `params`.
    #[must_use]
    pub fn from_parts(
        params: IvfPqBuildParams,
        default_search: IvfPqSearchParams,
        coarse: CoarseQuantizer,
        pq: ProductQuantizer,
        lists: Box<dyn ListSource>,
        ntotal: usize,
    ) -> Self {
        Self {
            params,
            trained: true,
            coarse,
            pq,
            lists,
            ntotal,
            id_map: None,
            default_search,
        }
    }

    /// Whether the coarse quantizer and product quantizer have been trained.
    #[must_use]
    pub const fn is_trained(&self) -> bool {
        self.trained
    }

    /// Total indexed vector count.
    #[must_use]
    pub const fn ntotal(&self) -> usize {
        self.ntotal
    }

    /// Build parameters this index was constructed with.
    #[must_use]
    pub const fn build_params(&self) -> &IvfPqBuildParams {
        &self.params
    }

    /// Persisted default search parameters (overridable per call).
    #[must_use]
    pub const fn default_search_params(&self) -> &IvfPqSearchParams {
        &self.default_search
    }

    /// Trains the coarse quantizer and every PQ sub-quantizer against
    /// `training_rows` (`n` rows of `dim` elements, row-major), emitting a
    /// `tracing::warn!` (not an error) if `nlist * min_rows_per_cluster >
    /// ntotal`, per the spec's warn-not-fail precondition.
    pub fn train(&mut self, training_rows: &[f32], n: usize) {
        if self.params.nlist.saturating_mul(self.params.min_rows_per_cluster) > n {
            tracing::warn!(
                nlist = self.params.nlist,
                min_rows_per_cluster = self.params.min_rows_per_cluster,
                ntotal = n,
                "nlist * min_rows_per_cluster exceeds ntotal; clusters may be under-populated"
            );
        }
        self.coarse
            .train(training_rows, n, self.params.kmeans_iterations);

        let residuals = if self.params.by_residual {
            self.residualize(training_rows, n)
        } else {
            training_rows.to_vec()
        };
        self.pq.train(&residuals, n, self.params.kmeans_iterations);
        self.trained = true;
    }

    fn residualize(&self, rows: &[f32], n: usize) -> Vec<f32> {
        let dim = self.params.dim;
        let mut out = vec![0.0f32; rows.len()];
        for i in 0..n {
            let row = &rows[i * dim..(i + 1) * dim];
            let (list, _) = self.coarse.assign(row);
            let centroid = self.coarse.centroid(list);
            for (d, (o, (r, c))) in out[i * dim..(i + 1) * dim]
                .iter_mut()
                .zip(row.iter().zip(centroid))
                .enumerate()
            {
                let _ = d;
                *o = r - c;
            }
        }
        out
    }

    /// Adds `n` rows of `dim` elements each, each under the corresponding
    /// `ids[i]`, installing an [`IdMap`] lazily on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the index hasn't been trained yet.
    pub fn add_with_ids(&mut self, rows: &[f32], n: usize, ids: &[i64]) -> Result<()> {
        if !self.trained {
            return Err(Error::InvalidState(
                "add_with_ids called before training".to_string(),
            ));
        }
        debug_assert_eq!(ids.len(), n);
        let dim = self.params.dim;
        let lists = self
            .lists
            .as_any_mut()
            .expect("builder-side lists are always InMemoryInvertedLists");

        for i in 0..n {
            let row = &rows[i * dim..(i + 1) * dim];
            let (list_no, _) = self.coarse.assign(row);
            let centroid = self.coarse.centroid(list_no);
            let residual: Vec<f32> = if self.params.by_residual {
                row.iter().zip(centroid).map(|(r, c)| r - c).collect()
            } else {
                row.to_vec()
            };
            let code = self.pq.encode(&residual);
            let decoded = self.pq.decode(&code);
            let err = l2_norm_diff(&residual, &decoded);
            lists.push(list_no, &code, ids[i], err);
        }
        self.ntotal += n;
        Ok(())
    }

    /// Checks the spec's per-list length invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] (fatal) on the first violated list.
    pub fn check_invariants(&self) -> Result<()> {
        self.lists
            .as_any()
            .map_or(Ok(()), InMemoryInvertedLists::check_invariants)
    }

    /// Replaces the inverted-list backend, e.g. with a
    /// [`BlockCacheInvertedLists`] after a block-cache reopen.
    pub fn set_lists(&mut self, lists: Box<dyn ListSource>) {
        self.lists = lists;
    }

    fn probe(&self, query: &[f32], nprobe: usize) -> Vec<(usize, f32)> {
        self.coarse.nearest(query, nprobe)
    }

    fn scan_list_topk(&self, query: &[f32], list_no: usize, dis0: f32) -> Vec<(i64, f32)> {
        let adc_query = if self.params.by_residual {
            let centroid = self.coarse.centroid(list_no);
            query.iter().zip(centroid).map(|(q, c)| q - c).collect::<Vec<_>>()
        } else {
            query.to_vec()
        };
        let table = self.pq.build_adc_table(&adc_query);
        let codes = self.lists.codes(list_no);
        let ids = self.lists.ids(list_no);
        let code_size = self.pq.code_size();
        ids.into_iter()
            .enumerate()
            .map(|(j, id)| {
                let code = &codes[j * code_size..(j + 1) * code_size];
                let dist = dis0 + self.pq.adc_distance(&table, code);
                (id, dist)
            })
            .collect()
    }

    fn scan_list_range(
        &self,
        query: &[f32],
        list_no: usize,
        dis0: f32,
        radius: f32,
        alpha: f32,
    ) -> Vec<(i64, f32)> {
        let adc_query = if self.params.by_residual {
            let centroid = self.coarse.centroid(list_no);
            query.iter().zip(centroid).map(|(q, c)| q - c).collect::<Vec<_>>()
        } else {
            query.to_vec()
        };
        let table = self.pq.build_adc_table(&adc_query);
        let codes = self.lists.codes(list_no);
        let ids = self.lists.ids(list_no);
        let errors = self.lists.reconstruction_errors(list_no);
        let code_size = self.pq.code_size();

        let mut out = Vec::new();
        for (j, id) in ids.into_iter().enumerate() {
            let code = &codes[j * code_size..(j + 1) * code_size];
            let dist_sq = dis0 + self.pq.adc_distance(&table, code);
            let accepted = if alpha > 0.0 {
                let eps = errors.get(j).copied().unwrap_or(0.0);
                let lower_bound = (dist_sq.max(0.0).sqrt() - alpha * eps).abs();
                lower_bound <= radius.max(0.0).sqrt()
            } else {
                dist_sq <= radius
            };
            if accepted {
                out.push((id, dist_sq));
            }
        }
        out
    }

    fn external_id(&self, internal_or_raw: i64) -> i64 {
        match &self.id_map {
            Some(map) => map
                .to_external(internal_or_raw.max(0) as usize)
                .unwrap_or(internal_or_raw),
            None => internal_or_raw,
        }
    }

    /// Top-`k` search for a single query, ascending squared-L2 order.
    /// Pads with `(-1, 0.0)` entries if fewer than `k` candidates exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `query.len() != dim`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        search: &IvfPqSearchParams,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        if query.len() != self.params.dim {
            return Err(Error::DimensionMismatch {
                expected: self.params.dim,
                actual: query.len(),
            });
        }
        let probes = self.probe(query, search.nprobe);
        let mut all: Vec<(i64, f32)> = probes
            .par_iter()
            .flat_map(|&(list_no, dis0)| self.scan_list_topk(query, list_no, dis0))
            .collect();
        all.retain(|(id, _)| filter.is_none_or(|f| f.is_member(self.external_id(*id))));
        all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        all.truncate(k);
        while all.len() < k {
            all.push((-1, 0.0));
        }
        Ok(all
            .into_iter()
            .map(|(id, d)| (if id < 0 { id } else { self.external_id(id) }, d))
            .collect())
    }

    /// Batch top-`k` search over `n` queries of `dim` elements each,
    /// parallelized per `search.parallel_mode`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `queries.len() != n * dim`.
    pub fn search_batch(
        &self,
        queries: &[f32],
        n: usize,
        k: usize,
        search: &IvfPqSearchParams,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<Vec<(i64, f32)>>> {
        if queries.len() != n * self.params.dim {
            return Err(Error::DimensionMismatch {
                expected: n * self.params.dim,
                actual: queries.len(),
            });
        }
        let dim = self.params.dim;
        let run = |i: usize| self.search(&queries[i * dim..(i + 1) * dim], k, search, filter);
        match search.parallel_mode {
            0 => (0..n).into_par_iter().map(run).collect(),
            _ => (0..n).map(run).collect(),
        }
    }

    /// Range search for a single query: every coded vector within `radius`
    /// (squared L2) of `query`, filtered by the reconstruction-error bound
    /// when `search.range_search_confidence > 0` (§4.4.2-3). Results are
    /// unordered beyond the implicit per-list scan order; callers that need
    /// a final order sort the returned vector themselves. `limit > 0`
    /// truncates to the closest `limit` entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `query.len() != dim`.
    pub fn range_search(
        &self,
        query: &[f32],
        radius: f32,
        search: &IvfPqSearchParams,
        limit: i64,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        if query.len() != self.params.dim {
            return Err(Error::DimensionMismatch {
                expected: self.params.dim,
                actual: query.len(),
            });
        }
        let alpha = search.range_search_confidence;
        let probes = self.probe(query, search.nprobe);

        let scan_one = |&(list_no, dis0): &(usize, f32)| {
            self.scan_list_range(query, list_no, dis0, radius, alpha)
        };
        let mut all: Vec<(i64, f32)> = match search.parallel_mode {
            1 | 2 => probes.par_iter().flat_map(scan_one).collect(),
            _ => probes.iter().flat_map(scan_one).collect(),
        };
        if search.max_codes > 0 {
            all.truncate(search.max_codes);
        }
        all.retain(|(id, _)| filter.is_none_or(|f| f.is_member(self.external_id(*id))));

        if limit > 0 {
            all.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            all.truncate(limit as usize);
        }

        Ok(all
            .into_iter()
            .map(|(id, d)| (self.external_id(id), d))
            .collect())
    }

    /// Batch range search, parallelizing across queries when
    /// `search.parallel_mode == 0`, or flattening the `queries x probes`
    /// product when `== 2` (both produce the same accepted set per query;
    /// only scan order differs).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `queries.len() != n * dim`.
    pub fn range_search_batch(
        &self,
        queries: &[f32],
        n: usize,
        radius: f32,
        search: &IvfPqSearchParams,
        limit: i64,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<Vec<(i64, f32)>>> {
        if queries.len() != n * self.params.dim {
            return Err(Error::DimensionMismatch {
                expected: n * self.params.dim,
                actual: queries.len(),
            });
        }
        let dim = self.params.dim;
        let run = |i: usize| {
            self.range_search(&queries[i * dim..(i + 1) * dim], radius, search, limit, filter)
        };
        match search.parallel_mode {
            0 => (0..n).into_par_iter().map(run).collect(),
            _ => (0..n).map(run).collect(),
        }
    }

    /// Sets the custom-row-id map (installed once, when the builder enabled
    /// `use_custom_row_id`).
    pub fn set_id_map(&mut self, map: IdMap) {
        self.id_map = Some(map);
    }

    /// The installed id map, if any.
    #[must_use]
    pub const fn id_map(&self) -> Option<&IdMap> {
        self.id_map.as_ref()
    }

    /// Read-only access to the coarse quantizer (for the codec).
    #[must_use]
    pub const fn coarse_quantizer(&self) -> &CoarseQuantizer {
        &self.coarse
    }

    /// Read-only access to the product quantizer (for the codec).
    #[must_use]
    pub const fn product_quantizer(&self) -> &ProductQuantizer {
        &self.pq
    }

    /// Read-only access to the inverted lists (for the codec).
    #[must_use]
    pub fn lists(&self) -> &dyn ListSource {
        self.lists.as_ref()
    }
}

fn l2_norm_diff(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
