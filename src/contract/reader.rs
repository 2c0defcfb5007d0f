//! [`IndexReader`]: opens a serialized [`Index`] handle from disk (§4.2
//! "Reader contract"), consulting the index-handle cache first unless
//! asked to bypass it.

use std::path::Path;
use std::sync::Arc;

use crate::cache::{CachePriority, IndexCache};
use crate::codec;
use crate::contract::extra::ReaderOptions;
use crate::error::Result;
use crate::index::Index;
use crate::meta::IndexMeta;

/// Reads [`Index`] handles from disk, cache-first per `meta.extra`'s
/// reader options.
pub struct IndexReader {
    meta: IndexMeta,
    cache: Arc<IndexCache>,
    block_cache: Arc<crate::cache::BlockCache>,
}

impl IndexReader {
    pub(crate) fn new(meta: IndexMeta, cache: Arc<IndexCache>, block_cache: Arc<crate::cache::BlockCache>) -> Self {
        Self {
            meta,
            cache,
            block_cache,
        }
    }

    /// Opens `path`: returns the cached handle when `cache_index_file` is
    /// set and a live entry exists (unless `force_read_and_overwrite_cache`
    /// is also set), otherwise reads from disk via [`codec::read_index`]
    /// and, when `cache_index_file` is set, inserts the freshly-read handle
    /// under the resolved key before returning it.
    ///
    /// # Errors
    ///
    /// Propagates [`codec::read_index`]'s errors: a missing/unreadable
    /// file, or a corrupted/unrecognized on-disk format.
    pub fn read(&self, path: &Path) -> Result<Arc<Index>> {
        let opts = ReaderOptions::from_meta(&self.meta)?;
        let key = opts.resolve_key(path);

        if opts.cache_index_file && !opts.force_read_and_overwrite_cache {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(hit);
            }
        }

        let index = codec::read_index(path, &self.meta, self.block_cache.clone())?;

        if opts.cache_index_file {
            Ok(self.cache.insert(key, index, CachePriority::Normal))
        } else {
            Ok(Arc::new(index))
        }
    }
}
