//! [`AnnSearcher`]: a read-only search handle over a loaded [`Index`],
//! with per-instance search-parameter overrides (§4.2 "Searcher contract",
//! §4.8 state machine).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::id_filter::IdFilter;
use crate::index::ivf_pq::IvfPqSearchParams;
use crate::index::Index;
use crate::meta::IndexMeta;

use super::reader::IndexReader;

/// Lifecycle state of an [`AnnSearcher`] (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearcherState {
    /// Built but no index loaded yet.
    Constructed,
    /// `read_index` has succeeded; `search`/`range_search` are valid.
    Loaded,
}

/// A loaded index plus overridable search parameters (§6).
///
/// The loaded handle is held behind an [`ArcSwapOption`] rather than a
/// plain `Option<Arc<Index>>` so that a concurrent `read_index` call
/// (§4.8: "re-`read_index` replaces the pinned handle atomically w.r.t.
/// subsequent search calls") never observes a torn or half-replaced
/// reference from another thread's in-flight `search`.
pub struct AnnSearcher {
    meta: IndexMeta,
    reader: IndexReader,
    state: SearcherState,
    handle: ArcSwapOption<Index>,
    ivf_override: Option<IvfPqSearchParams>,
    ef_search_override: Option<usize>,
    path: Option<PathBuf>,
}

impl AnnSearcher {
    pub(crate) fn new(meta: IndexMeta, reader: IndexReader) -> Self {
        Self {
            meta,
            reader,
            state: SearcherState::Constructed,
            handle: ArcSwapOption::empty(),
            ivf_override: None,
            ef_search_override: None,
            path: None,
        }
    }

    /// Loads the index at `path` via the underlying [`IndexReader`],
    /// transitioning to `Loaded`. The new handle is published atomically:
    /// a `search` call already in flight on the previous handle runs to
    /// completion against it, and any call that starts after this returns
    /// sees only the new one.
    ///
    /// # Errors
    ///
    /// Propagates [`IndexReader::read`]'s errors.
    pub fn read_index(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let handle = self.reader.read(&path)?;
        self.handle.store(Some(handle));
        self.path = Some(path);
        self.state = SearcherState::Loaded;
        Ok(())
    }

    fn require_loaded(&self) -> Result<Arc<Index>> {
        self.handle.load_full().ok_or_else(|| {
            Error::InvalidState("searcher requires Loaded; call read_index first".to_string())
        })
    }

    /// Overrides a single search-parameter key. Accepted keys: `nprobe`,
    /// `max_codes`, `parallel_mode`, `range_search_confidence` (IVF-PQ), and
    /// `efSearch` (HNSW).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParam`] for an unrecognized key or a value of
    /// the wrong type.
    pub fn set_search_param_item(&mut self, key: &str, value: &Json) -> Result<()> {
        if key == "efSearch" {
            let v = value.as_u64().ok_or_else(|| Error::InvalidParam {
                key: key.to_string(),
                reason: "expected an unsigned integer".to_string(),
            })?;
            self.ef_search_override = Some(v as usize);
            return Ok(());
        }

        let mut params = self.ivf_override.unwrap_or_else(|| self.default_ivf_params());
        match key {
            "nprobe" => {
                params.nprobe = value
                    .as_u64()
                    .ok_or_else(|| Error::InvalidParam {
                        key: key.to_string(),
                        reason: "expected an unsigned integer".to_string(),
                    })? as usize;
            }
            "max_codes" => {
                params.max_codes = value
                    .as_u64()
                    .ok_or_else(|| Error::InvalidParam {
                        key: key.to_string(),
                        reason: "expected an unsigned integer".to_string(),
                    })? as usize;
            }
            "parallel_mode" => {
                params.parallel_mode = value
                    .as_u64()
                    .ok_or_else(|| Error::InvalidParam {
                        key: key.to_string(),
                        reason: "expected an unsigned integer".to_string(),
                    })? as u8;
            }
            "range_search_confidence" => {
                params.range_search_confidence = value.as_f64().ok_or_else(|| Error::InvalidParam {
                    key: key.to_string(),
                    reason: "expected a float".to_string(),
                })? as f32;
            }
            other => {
                return Err(Error::InvalidParam {
                    key: other.to_string(),
                    reason: "unrecognized search parameter key".to_string(),
                })
            }
        }
        self.ivf_override = Some(params);
        Ok(())
    }

    /// Applies every key in a JSON object as a [`Self::set_search_param_item`]
    /// call, in field order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `patch` isn't a JSON object, or
    /// propagates the first unrecognized-key/type error.
    pub fn set_search_params(&mut self, patch: &Json) -> Result<()> {
        let obj = patch
            .as_object()
            .ok_or_else(|| Error::InvalidArgument("search params patch must be a JSON object".to_string()))?;
        for (key, value) in obj {
            self.set_search_param_item(key, value)?;
        }
        Ok(())
    }

    fn default_ivf_params(&self) -> IvfPqSearchParams {
        match self.handle.load().as_deref() {
            Some(Index::IvfPq(i)) => *i.default_search_params(),
            Some(Index::IvfPqPreTransform(i)) => *i.inner().default_search_params(),
            _ => IvfPqSearchParams {
                nprobe: 1,
                max_codes: 0,
                parallel_mode: 0,
                range_search_confidence: 0.0,
            },
        }
    }

    /// Top-`k` search using any overridden parameters, falling back to the
    /// index's own persisted defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless loaded, or propagates the
    /// underlying engine's `search` error.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&dyn IdFilter>) -> Result<Vec<(i64, f32)>> {
        let handle = self.require_loaded()?;
        match (handle.as_ref(), self.ivf_override, self.ef_search_override) {
            (Index::Hnsw(h), _, Some(ef)) => h.search(query, k, ef, filter),
            (Index::IvfPq(i), Some(params), _) => i.search(query, k, &params, filter),
            (Index::IvfPqPreTransform(i), Some(params), _) => i.search(query, k, &params, filter),
            _ => handle.search(query, k, filter),
        }
    }

    /// Range search using any overridden parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless loaded, or propagates the
    /// underlying engine's `range_search` error.
    pub fn range_search(
        &self,
        query: &[f32],
        radius: f32,
        limit: i64,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        let handle = self.require_loaded()?;
        match (handle.as_ref(), self.ivf_override, self.ef_search_override) {
            (Index::Hnsw(h), _, Some(ef)) => h.range_search(query, radius, ef, filter),
            (Index::IvfPq(i), Some(params), _) => i.range_search(query, radius, &params, limit, filter),
            (Index::IvfPqPreTransform(i), Some(params), _) => {
                i.range_search(query, radius, &params, limit, filter)
            }
            _ => handle.range_search(query, radius, limit, filter),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SearcherState {
        self.state
    }

    /// The path the loaded handle was read from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The meta this searcher was constructed with.
    #[must_use]
    pub const fn meta(&self) -> &IndexMeta {
        &self.meta
    }
}
