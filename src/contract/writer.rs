//! [`IndexWriter`]: serializes an already-built [`Index`] handle to disk
//! (§4.2 "Writer contract").
//!
//! Caching is the caller's responsibility — the writer only ever borrows
//! the handle, so it has no way to take ownership for a cache insert. The
//! [`crate::contract::builder::IndexBuilder`] pins handles it still owns
//! into the cache itself, after calling [`IndexWriter::write`] to persist
//! them.

use std::path::Path;
use std::sync::Arc;

use crate::cache::IndexCache;
use crate::codec;
use crate::contract::extra::WriterOptions;
use crate::error::Result;
use crate::index::Index;
use crate::meta::IndexMeta;

/// Serializes [`Index`] handles to disk per `meta.extra`'s writer options.
pub struct IndexWriter {
    #[allow(dead_code)]
    cache: Arc<IndexCache>,
}

impl IndexWriter {
    /// Builds a writer. `cache` is currently unused by `write` itself (see
    /// module docs) but kept so a future writer-side cache warm path has
    /// somewhere to plug in without changing the factory's signature.
    #[must_use]
    pub const fn new(cache: Arc<IndexCache>) -> Self {
        Self { cache }
    }

    /// Writes `handle` to `path`, unless `memory_only` is set. The
    /// `cache_index_block` option in `meta.extra` selects the IVF-PQ
    /// inverted-list on-disk layout (`ilbc`, lazily block-loaded) over the
    /// default fully-resident `ilar`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`](crate::error::Error::Unsupported) for
    /// an HNSW handle (no wire format is defined for HNSW; see
    /// [`crate::codec`]), or propagates codec/I/O errors otherwise. A no-op
    /// when `memory_only` is `true`.
    pub fn write(&self, handle: &Index, path: &Path, meta: &IndexMeta, memory_only: bool) -> Result<()> {
        if memory_only {
            return Ok(());
        }
        let opts = WriterOptions::from_meta(meta)?;
        let write_opts = codec::WriteOptions {
            cache_index_block: opts.cache_index_block,
            ..codec::WriteOptions::default()
        };
        codec::write_index(path, handle, meta, write_opts)
    }
}
