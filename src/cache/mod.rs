//! Sharded LRU cache (C3) and the process-wide default cache instances
//! (C11).
//!
//! [`SharedCache`] is the generic, capacity-weighted, refcounted cache used
//! both by the block-cache inverted lists (keyed by list/block number,
//! storing raw `Vec<u8>` pages) and, independently, to hold opened index
//! handles (keyed by an opaque cache-key string, storing [`crate::index::Index`]).
//! [`default_block_cache`] and [`default_index_cache`] are the
//! lazily-initialized singletons a reader or writer falls back to when it
//! isn't handed an explicit cache instance.

use std::sync::{Arc, OnceLock};

mod bloom;
mod sharded;

pub use bloom::BloomFilter;
pub use sharded::{CachePriority, CacheStats, CacheWeight, SharedCache};

/// Key identifying one inverted list's aligned disk window within a
/// block-cache index. `file_key` folds together the file identity and
/// modification time (`hash(filename) || mtime`, per the spec's per-list
/// cache-key construction) so windows from a stale or replaced file never
/// collide with windows from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// `hash(filename) || mtime` for the owning index file.
    pub file_key: u64,
    /// Owning inverted list.
    pub list_no: u32,
}

/// Cache of raw, aligned block-cache pages shared across indexes that don't
/// supply their own.
pub type BlockCache = SharedCache<BlockKey, Vec<u8>>;

/// Cache of loaded index handles, keyed by an opaque cache key (the flush
/// path, or a caller-supplied `custom_cache_key`).
pub type IndexCache = SharedCache<String, crate::index::Index>;

static DEFAULT_BLOCK_CACHE: OnceLock<Arc<BlockCache>> = OnceLock::new();
static DEFAULT_INDEX_CACHE: OnceLock<Arc<IndexCache>> = OnceLock::new();

/// Returns the process-wide default block cache, sized from
/// [`crate::config::Config::load`] on first use (falling back to that
/// config's compiled-in defaults if no `vindex.toml`/env overrides apply).
#[must_use]
pub fn default_block_cache() -> Arc<BlockCache> {
    DEFAULT_BLOCK_CACHE
        .get_or_init(|| {
            let cfg = crate::config::Config::load().unwrap_or_default();
            Arc::new(SharedCache::new(cfg.cache.capacity_bytes, cfg.cache.shard_count))
        })
        .clone()
}

/// Returns the process-wide default index-handle cache (C11), the single
/// 1 GiB instance every factory shares unless given a local one.
#[must_use]
pub fn default_index_cache() -> Arc<IndexCache> {
    DEFAULT_INDEX_CACHE
        .get_or_init(|| {
            let cfg = crate::config::Config::load().unwrap_or_default();
            Arc::new(SharedCache::new(cfg.cache.capacity_bytes, cfg.cache.shard_count))
        })
        .clone()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
