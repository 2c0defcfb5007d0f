//! Shared parsing of the `extra` meta section's writer/reader options
//! (§3 "Writer/reader options").

use crate::meta::{IndexMeta, Section};
use crate::error::Result;

/// Writer-side cache/persistence options read from `meta.extra`.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Whether `flush`/`write` should insert the handle into the index
    /// cache after serializing (or, for `memory_only` writes, instead of
    /// serializing).
    pub write_index_cache: bool,
    /// Whether inverted lists are written in the lazily block-loaded
    /// `ilbc` layout rather than the fully resident `ilar` layout.
    pub cache_index_block: bool,
    /// Overrides the cache key used when `write_index_cache` is set;
    /// defaults to the flush/write path.
    pub custom_cache_key: Option<String>,
}

impl WriterOptions {
    /// Reads writer options out of `meta.extra`, applying the spec's
    /// defaults (everything off, no custom key).
    ///
    /// # Errors
    ///
    /// Returns an error if a present key has the wrong type.
    pub fn from_meta(meta: &IndexMeta) -> Result<Self> {
        Ok(Self {
            write_index_cache: meta
                .optional::<bool>(Section::Extra, "write_index_cache")?
                .unwrap_or(false),
            cache_index_block: meta
                .optional::<bool>(Section::Extra, "cache_index_block")?
                .unwrap_or(false),
            custom_cache_key: meta.optional::<String>(Section::Extra, "custom_cache_key")?,
        })
    }
}

/// Reader-side cache options read from `meta.extra`.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Whether `read` consults the index cache before hitting disk.
    pub cache_index_file: bool,
    /// Overrides the cache key used for lookup/insert; defaults to the
    /// read path.
    pub custom_cache_key: Option<String>,
    /// Unconditionally replaces any existing cache entry under the
    /// resolved key, instead of returning a stale hit.
    pub force_read_and_overwrite_cache: bool,
}

impl ReaderOptions {
    /// Reads reader options out of `meta.extra`.
    ///
    /// # Errors
    ///
    /// Returns an error if a present key has the wrong type.
    pub fn from_meta(meta: &IndexMeta) -> Result<Self> {
        Ok(Self {
            cache_index_file: meta
                .optional::<bool>(Section::Extra, "cache_index_file")?
                .unwrap_or(false),
            custom_cache_key: meta.optional::<String>(Section::Extra, "custom_cache_key")?,
            force_read_and_overwrite_cache: meta
                .optional::<bool>(Section::Extra, "force_read_and_overwrite_cache")?
                .unwrap_or(false),
        })
    }

    /// Resolves the cache key for `path`: `custom_cache_key` if set,
    /// otherwise the path's string form.
    #[must_use]
    pub fn resolve_key(&self, path: &std::path::Path) -> String {
        self.custom_cache_key
            .clone()
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }
}
