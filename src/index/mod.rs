//! Index handle (C4): a single owned, tagged-union handle over the two
//! index families this crate supports, plus the IVF-PQ pre-transform
//! wrapper (§4.5-4.6). The source represents this as an opaque pointer
//! behind a factory-returned handle; in Rust that collapses to a plain
//! enum matched at every call site instead of a `void*` and a manual
//! downcast.

pub mod hnsw;
pub mod ivf_pq;
pub mod pretransform;

pub use hnsw::HnswIndex;
pub use ivf_pq::IvfPqIndex;
pub use pretransform::{IvfPqPreTransformIndex, PreTransformChain, PreTransformKind};

use crate::cache::CacheWeight;
use crate::error::{Error, Result};
use crate::id_filter::IdFilter;
use crate::meta::IndexType;

/// An opened index, in one of the two families the codec understands.
pub enum Index {
    /// HNSW graph index (`FaissHNSW`).
    Hnsw(HnswIndex),
    /// Plain IVF-PQ index, no pre-transform (`FaissIVFPQ`, base `IwPQ`).
    IvfPq(IvfPqIndex),
    /// IVF-PQ index wrapped in a pre-transform chain (base `IxPT`), used
    /// when the caller-facing metric requires normalization the IVF-PQ
    /// engine itself doesn't perform internally.
    IvfPqPreTransform(IvfPqPreTransformIndex),
}

impl Index {
    /// The [`IndexType`] this handle reports itself as for meta/codec
    /// purposes. Both IVF-PQ variants report `FaissIVFPQ`; whether a
    /// pre-transform prefix is present is purely a codec/base-tag detail.
    #[must_use]
    pub const fn index_type(&self) -> IndexType {
        match self {
            Self::Hnsw(_) => IndexType::FaissHNSW,
            Self::IvfPq(_) | Self::IvfPqPreTransform(_) => IndexType::FaissIVFPQ,
        }
    }

    /// Total indexed vector count.
    #[must_use]
    pub fn ntotal(&self) -> usize {
        match self {
            Self::Hnsw(h) => h.len(),
            Self::IvfPq(i) => i.ntotal(),
            Self::IvfPqPreTransform(i) => i.inner().ntotal(),
        }
    }

    /// Unwraps a reference to the inner [`HnswIndex`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if this handle isn't an HNSW index.
    pub fn as_hnsw(&self) -> Result<&HnswIndex> {
        match self {
            Self::Hnsw(h) => Ok(h),
            _ => Err(Error::InvalidState("index handle is not HNSW".to_string())),
        }
    }

    /// Unwraps a mutable reference to the inner [`IvfPqIndex`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if this handle isn't a plain IVF-PQ
    /// index (i.e. it's HNSW, or it's wrapped in a pre-transform chain).
    pub fn as_ivf_pq_mut(&mut self) -> Result<&mut IvfPqIndex> {
        match self {
            Self::IvfPq(i) => Ok(i),
            _ => Err(Error::InvalidState(
                "index handle is not a bare IVF-PQ index".to_string(),
            )),
        }
    }

    /// Unwraps a reference to the inner [`IvfPqPreTransformIndex`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if this handle isn't a pre-transform
    /// wrapped IVF-PQ index.
    pub fn as_ivf_pq_pretransform(&self) -> Result<&IvfPqPreTransformIndex> {
        match self {
            Self::IvfPqPreTransform(i) => Ok(i),
            _ => Err(Error::InvalidState(
                "index handle is not a pre-transform IVF-PQ index".to_string(),
            )),
        }
    }

    /// Mutable access to the inner [`IvfPqPreTransformIndex`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if this handle isn't a pre-transform
    /// wrapped IVF-PQ index.
    pub fn as_ivf_pq_pretransform_mut(&mut self) -> Result<&mut IvfPqPreTransformIndex> {
        match self {
            Self::IvfPqPreTransform(i) => Ok(i),
            _ => Err(Error::InvalidState(
                "index handle is not a pre-transform IVF-PQ index".to_string(),
            )),
        }
    }

    /// Top-`k` search dispatched to whichever variant this handle wraps.
    /// HNSW search uses `default_ef_search = k.max(64)` when the caller
    /// hasn't opted into a per-call override; IVF-PQ and the pre-transform
    /// wrapper use their own persisted default search params.
    ///
    /// # Errors
    ///
    /// Propagates whichever variant's own `search` error.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&dyn IdFilter>) -> Result<Vec<(i64, f32)>> {
        match self {
            Self::Hnsw(h) => h.search(query, k, k.max(64), filter),
            Self::IvfPq(i) => i.search(query, k, i.default_search_params(), filter),
            Self::IvfPqPreTransform(i) => {
                i.search(query, k, i.inner().default_search_params(), filter)
            }
        }
    }

    /// Range search dispatched to whichever variant this handle wraps, with
    /// no `k` limit beyond `limit` (IVF-PQ) or `max_expansions` (HNSW,
    /// fixed at `1024` when not otherwise configurable per-call).
    ///
    /// # Errors
    ///
    /// Propagates whichever variant's own `range_search` error, including
    /// [`Error::Unsupported`] for an inner-product HNSW index.
    pub fn range_search(
        &self,
        query: &[f32],
        radius: f32,
        limit: i64,
        filter: Option<&dyn IdFilter>,
    ) -> Result<Vec<(i64, f32)>> {
        match self {
            Self::Hnsw(h) => h.range_search(query, radius, 1024, filter),
            Self::IvfPq(i) => i.range_search(query, radius, i.default_search_params(), limit, filter),
            Self::IvfPqPreTransform(i) => {
                i.range_search(query, radius, i.inner().default_search_params(), limit, filter)
            }
        }
    }
}

impl CacheWeight for Index {
    fn cache_weight(&self) -> u64 {
        // Approximate resident footprint: a crude per-vector estimate is
        // enough to keep the index cache's byte budget meaningful without
        // walking every internal structure on every insert.
        match self {
            Self::Hnsw(h) => (h.len() as u64).saturating_mul(256).max(1),
            Self::IvfPq(i) => (i.ntotal() as u64).saturating_mul(64).max(1),
            Self::IvfPqPreTransform(i) => (i.inner().ntotal() as u64).saturating_mul(64).max(1),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
