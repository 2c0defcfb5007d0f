//! [`IndexBuilder`]: the open/add/flush/close lifecycle (§4.2, §4.8).
//!
//! One builder owns exactly one [`Index`] handle from `open` to `close`.
//! HNSW has no training phase: `add` inserts into the graph immediately.
//! IVF-PQ defers training to `flush` ("train-on-flush"): rows accumulate in
//! a pending buffer — copied eagerly by [`IndexBuilder::add`], or borrowed
//! for the builder's lifetime by [`IndexBuilder::add_borrowed`] when the
//! caller can guarantee its buffers outlive the next `flush` — and are only
//! materialized into one contiguous training batch when `flush` runs.
//!
//! `flush` is terminal: it finalizes the handle, writes/pins it once, and
//! leaves the builder `Closed`. The source's builder allows repeated
//! flush-then-keep-training cycles before a final close; this crate decided
//! against that (see `DESIGN.md`) because reopening a flushed handle for
//! further writes would require cloning a potentially multi-gigabyte index
//! just to keep both the cache's copy and the builder's copy independently
//! mutable, which no caller of this crate has asked for.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CachePriority, IndexCache};
use crate::contract::extra::WriterOptions;
use crate::contract::writer::IndexWriter;
use crate::error::{Error, Result};
use crate::index::hnsw::{HnswIndex, HnswParams};
use crate::index::ivf_pq::{IvfPqBuildParams, IvfPqIndex, IvfPqSearchParams};
use crate::index::pretransform::{IvfPqPreTransformIndex, L2NormalizeTransform, PreTransformChain};
use crate::index::Index;
use crate::meta::{IndexMeta, IndexType, Section};
use crate::vector_view::VectorColumn;

/// Lifecycle state of an [`IndexBuilder`] (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Before `open`.
    Uninitialized,
    /// Between `open` and `flush`/`close`; `add`/`flush` are valid.
    Open,
    /// After `flush` or `close`; no further operations are valid.
    Closed,
}

enum PendingRows<'a> {
    Owned { data: Vec<f32>, ids: Vec<i64> },
    Borrowed { rows: Vec<&'a [f32]>, ids: Vec<i64> },
}

impl<'a> PendingRows<'a> {
    const fn new_owned() -> Self {
        Self::Owned {
            data: Vec::new(),
            ids: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Owned { ids, .. } | Self::Borrowed { ids, .. } => ids.is_empty(),
        }
    }

    /// Flattens into one contiguous `(rows, ids)` pair. This is the one
    /// unavoidable copy for the borrowed path: the "no copy until flush"
    /// promise is about `add`, not about the final training batch.
    fn materialize(self, dim: usize) -> (Vec<f32>, Vec<i64>) {
        match self {
            Self::Owned { data, ids } => (data, ids),
            Self::Borrowed { rows, ids } => {
                let mut data = Vec::with_capacity(rows.len() * dim);
                for row in rows {
                    data.extend_from_slice(row);
                }
                (data, ids)
            }
        }
    }
}

enum Engine<'a> {
    Hnsw(HnswIndex),
    IvfPq {
        index: IvfPqIndex,
        cosine_chain: bool,
        pending: PendingRows<'a>,
    },
}

/// The open/add/flush/close builder (§4.2, §6).
pub struct IndexBuilder<'a> {
    meta: IndexMeta,
    state: BuilderState,
    path: Option<PathBuf>,
    use_custom_row_id: bool,
    next_id: i64,
    engine: Option<Engine<'a>>,
    cache: Arc<IndexCache>,
}

impl<'a> IndexBuilder<'a> {
    pub(crate) fn new(meta: IndexMeta, cache: Arc<IndexCache>) -> Self {
        Self {
            meta,
            state: BuilderState::Uninitialized,
            path: None,
            use_custom_row_id: false,
            next_id: 0,
            engine: None,
            cache,
        }
    }

    fn build_engine(&self) -> Result<Engine<'a>> {
        match self.meta.index_type {
            IndexType::FaissHNSW => {
                let params = HnswParams::from_meta(&self.meta)?;
                Ok(Engine::Hnsw(HnswIndex::new(params)))
            }
            IndexType::FaissIVFPQ => {
                let params = IvfPqBuildParams::from_meta(&self.meta)?;
                let search = IvfPqSearchParams::from_meta(&self.meta)?;
                let cosine_chain = params.metric.needs_normalization() && !params.is_vector_normed;
                Ok(Engine::IvfPq {
                    index: IvfPqIndex::new(params, search),
                    cosine_chain,
                    pending: PendingRows::new_owned(),
                })
            }
            IndexType::FaissIVFFlat => Err(Error::Unsupported(
                "index_type FaissIVFFlat has no engine in this crate (HNSW and IVF-PQ only)"
                    .to_string(),
            )),
        }
    }

    fn require_uninitialized(&self) -> Result<()> {
        if self.state != BuilderState::Uninitialized {
            return Err(Error::InvalidState(format!(
                "open requires Uninitialized, builder is in {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Opens the builder in memory: no path is remembered, and `flush`
    /// will not serialize to disk unless the cache is asked to pin the
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if already open or closed, or
    /// propagates meta-parsing errors from the family-specific build
    /// parameters.
    pub fn open(&mut self) -> Result<()> {
        self.require_uninitialized()?;
        self.use_custom_row_id = self
            .meta
            .optional::<bool>(Section::Extra, "use_custom_row_id")?
            .unwrap_or(false);
        self.engine = Some(self.build_engine()?);
        self.state = BuilderState::Open;
        Ok(())
    }

    /// Opens the builder bound to `path`, remembered for `flush`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::open`].
    pub fn open_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.open()?;
        self.path = Some(path.into());
        Ok(())
    }

    fn require_open(&self) -> Result<()> {
        if self.state != BuilderState::Open {
            return Err(Error::InvalidState(format!(
                "operation requires Open, builder is in {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn validate_ids(&self, n: usize, row_ids: Option<&[i64]>, null_flags: Option<&[bool]>) -> Result<()> {
        if self.use_custom_row_id && row_ids.is_none() {
            return Err(Error::InvalidArgument(
                "use_custom_row_id is set; row_ids is required".to_string(),
            ));
        }
        if !self.use_custom_row_id && row_ids.is_some() {
            return Err(Error::InvalidArgument(
                "row_ids supplied but use_custom_row_id is not set".to_string(),
            ));
        }
        if let Some(ids) = row_ids {
            if ids.len() != n {
                return Err(Error::InvalidArgument(format!(
                    "row_ids length {} != row count {n}",
                    ids.len()
                )));
            }
        }
        if null_flags.is_some() && row_ids.is_none() {
            return Err(Error::InvalidArgument(
                "null_flags without row_ids is not allowed".to_string(),
            ));
        }
        if let Some(flags) = null_flags {
            if flags.len() != n {
                return Err(Error::InvalidArgument(format!(
                    "null_flags length {} != row count {n}",
                    flags.len()
                )));
            }
        }
        Ok(())
    }

    fn assign_id(&mut self, i: usize, row_ids: Option<&[i64]>) -> i64 {
        match row_ids {
            Some(ids) => ids[i],
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        }
    }

    /// Appends a batch, copying every accepted row into owned storage
    /// immediately. Rows flagged `null_flags[i]` are skipped; the null
    /// check is applied before any row is indexed, so `i` advances
    /// unconditionally across the slice regardless of how many rows are
    /// actually accepted (the canonical choice for the source's
    /// inconsistent i-vs-i+1 null-flag increment, see `DESIGN.md`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the builder is `Open`, or
    /// [`Error::InvalidArgument`] on `row_ids`/`null_flags` misuse.
    pub fn add(
        &mut self,
        vectors: VectorColumn<'_>,
        row_ids: Option<&[i64]>,
        null_flags: Option<&[bool]>,
    ) -> Result<()> {
        self.require_open()?;
        let n = vectors.len();
        self.validate_ids(n, row_ids, null_flags)?;

        for i in 0..n {
            if null_flags.is_some_and(|f| f[i]) {
                continue;
            }
            let row = vectors.row(i);
            let id = self.assign_id(i, row_ids);
            self.add_one_owned(row, id)?;
        }
        Ok(())
    }

    /// Appends a batch, borrowing `vectors` for the builder's own lifetime
    /// instead of copying. Only meaningful for the IVF-PQ family (HNSW has
    /// no buffering phase to borrow into); for HNSW this behaves exactly
    /// like [`Self::add`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::add`].
    pub fn add_borrowed(
        &mut self,
        vectors: VectorColumn<'a>,
        row_ids: Option<&[i64]>,
        null_flags: Option<&[bool]>,
    ) -> Result<()> {
        self.require_open()?;
        let n = vectors.len();
        self.validate_ids(n, row_ids, null_flags)?;

        if matches!(self.engine, Some(Engine::Hnsw(_))) {
            return self.add(vectors, row_ids, null_flags);
        }

        let Some(Engine::IvfPq { pending, .. }) = self.engine.as_mut() else {
            unreachable!("open sets engine to Hnsw or IvfPq")
        };
        for i in 0..n {
            if null_flags.is_some_and(|f| f[i]) {
                continue;
            }
            let row = vectors.row(i);
            let id = self.assign_id(i, row_ids);
            match pending {
                PendingRows::Borrowed { rows, ids } => {
                    rows.push(row);
                    ids.push(id);
                }
                PendingRows::Owned { data, ids } if data.is_empty() && ids.is_empty() => {
                    *pending = PendingRows::Borrowed {
                        rows: vec![row],
                        ids: vec![id],
                    };
                }
                PendingRows::Owned { data, ids } => {
                    data.extend_from_slice(row);
                    ids.push(id);
                }
            }
        }
        Ok(())
    }

    fn add_one_owned(&mut self, row: &[f32], id: i64) -> Result<()> {
        match self.engine.as_mut().expect("open sets engine") {
            Engine::Hnsw(hnsw) => {
                if self.use_custom_row_id {
                    hnsw.add_with_id(row, id)
                } else {
                    hnsw.add(row).map(|_| ())
                }
            }
            Engine::IvfPq { pending, .. } => {
                match pending {
                    PendingRows::Owned { data, ids } => {
                        data.extend_from_slice(row);
                        ids.push(id);
                    }
                    PendingRows::Borrowed { .. } => {
                        let owned = row.to_vec();
                        let mut data = Vec::new();
                        let mut ids;
                        if let PendingRows::Borrowed { rows, ids: old_ids } =
                            std::mem::replace(pending, PendingRows::new_owned())
                        {
                            for r in rows {
                                data.extend_from_slice(r);
                            }
                            ids = old_ids;
                        } else {
                            ids = Vec::new();
                        }
                        data.extend_from_slice(&owned);
                        ids.push(id);
                        *pending = PendingRows::Owned { data, ids };
                    }
                }
                Ok(())
            }
        }
    }

    /// Trains (if needed), serializes to `path` unless memory-only, and
    /// optionally inserts into the cache under `cache_key` (defaulting to
    /// `custom_cache_key` from `meta.extra`, then the write path). Leaves
    /// the builder `Closed`; no further `add`/`flush` calls are valid.
    ///
    /// An empty pending buffer (`nb = 0`) is flushed as an untrained,
    /// zero-row shell rather than invoking training: k-means has no
    /// meaningful centroids to fit over zero rows, and an untrained,
    /// empty IVF-PQ index still searches correctly (every list is empty,
    /// so every query returns zero results).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the builder is `Open`, or
    /// propagates codec/I/O errors from serialization.
    pub fn flush(&mut self, write_cache: bool, cache_key: Option<String>) -> Result<()> {
        self.require_open()?;
        let dim = self.meta.dim()?;

        if let Engine::IvfPq { index, pending, .. } = self.engine.as_mut().expect("open sets engine") {
            let taken = std::mem::replace(pending, PendingRows::new_owned());
            if !taken.is_empty() {
                let (data, ids) = taken.materialize(dim);
                let n = ids.len();
                if !index.is_trained() {
                    index.train(&data, n);
                }
                index.add_with_ids(&data, n, &ids)?;
            }
            index.check_invariants()?;
        }

        let handle = self.take_handle();
        let writer_opts = WriterOptions::from_meta(&self.meta)?;
        let writer = IndexWriter::new(self.cache.clone());
        if let Some(path) = &self.path {
            writer.write(&handle, path, &self.meta, false)?;
        }
        if write_cache || writer_opts.write_index_cache {
            let key = cache_key
                .or(writer_opts.custom_cache_key)
                .or_else(|| self.path.as_ref().map(|p| p.to_string_lossy().into_owned()));
            if let Some(k) = key {
                self.cache.insert(k, handle, CachePriority::Normal);
            }
        }

        self.engine = None;
        self.state = BuilderState::Closed;
        Ok(())
    }

    fn take_handle(&mut self) -> Index {
        match self.engine.take().expect("open sets engine") {
            Engine::Hnsw(hnsw) => Index::Hnsw(hnsw),
            Engine::IvfPq {
                index, cosine_chain, ..
            } => {
                if cosine_chain {
                    let chain = PreTransformChain::new(vec![Box::new(L2NormalizeTransform)]);
                    Index::IvfPqPreTransform(IvfPqPreTransformIndex::new(
                        chain,
                        index.build_params().metric,
                        Box::new(index),
                    ))
                } else {
                    Index::IvfPq(index)
                }
            }
        }
    }

    /// Drops any buffered input references and transitions to `Closed`
    /// without writing or caching anything. Use `flush` to finalize.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the builder is `Open`.
    pub fn close(&mut self) -> Result<()> {
        self.require_open()?;
        self.engine = None;
        self.state = BuilderState::Closed;
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> BuilderState {
        self.state
    }
}
