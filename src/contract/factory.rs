//! Family-dispatched factories (§4.2): take an [`IndexMeta`] and return the
//! contract object appropriate for its `index_family`/`index_type`,
//! defaulting to the process-wide caches (C11) unless the caller injects
//! its own.

use crate::cache::{self, BlockCache, IndexCache};
use crate::error::{Error, Result};
use crate::meta::{IndexFamily, IndexMeta};
use std::sync::Arc;

use super::builder::IndexBuilder;
use super::reader::IndexReader;
use super::searcher::AnnSearcher;
use super::writer::IndexWriter;

fn require_vector_family(meta: &IndexMeta) -> Result<()> {
    if meta.index_family != IndexFamily::Vector {
        return Err(Error::Unsupported(format!(
            "index_family {:?} is not implemented by this crate",
            meta.index_family
        )));
    }
    Ok(())
}

/// Builds an [`IndexBuilder`] for `meta`, using the process-wide default
/// index cache for any later cache-pinning `flush` performs.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if `meta.index_family` isn't `Vector`.
pub fn create_builder<'a>(meta: IndexMeta) -> Result<IndexBuilder<'a>> {
    require_vector_family(&meta)?;
    Ok(IndexBuilder::new(meta, cache::default_index_cache()))
}

/// Builds an [`IndexBuilder`] against an explicit index cache instead of
/// the process-wide default.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if `meta.index_family` isn't `Vector`.
pub fn create_builder_with_cache<'a>(meta: IndexMeta, cache: Arc<IndexCache>) -> Result<IndexBuilder<'a>> {
    require_vector_family(&meta)?;
    Ok(IndexBuilder::new(meta, cache))
}

/// Builds an [`IndexWriter`] for `meta`.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if `meta.index_family` isn't `Vector`.
pub fn create_writer(meta: &IndexMeta) -> Result<IndexWriter> {
    require_vector_family(meta)?;
    Ok(IndexWriter::new(cache::default_index_cache()))
}

/// Builds an [`IndexReader`] for `meta`, using the process-wide default
/// index and block caches.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if `meta.index_family` isn't `Vector`.
pub fn create_reader(meta: IndexMeta) -> Result<IndexReader> {
    require_vector_family(&meta)?;
    Ok(IndexReader::new(
        meta,
        cache::default_index_cache(),
        cache::default_block_cache(),
    ))
}

/// Builds an [`IndexReader`] against explicit caches instead of the
/// process-wide defaults.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if `meta.index_family` isn't `Vector`.
pub fn create_reader_with_caches(
    meta: IndexMeta,
    index_cache: Arc<IndexCache>,
    block_cache: Arc<BlockCache>,
) -> Result<IndexReader> {
    require_vector_family(&meta)?;
    Ok(IndexReader::new(meta, index_cache, block_cache))
}

/// Builds an unloaded [`AnnSearcher`] for `meta`; call
/// [`AnnSearcher::read_index`] before searching.
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if `meta.index_family` isn't `Vector`.
pub fn create_searcher(meta: IndexMeta) -> Result<AnnSearcher> {
    require_vector_family(&meta)?;
    let reader = create_reader(meta.clone())?;
    Ok(AnnSearcher::new(meta, reader))
}
