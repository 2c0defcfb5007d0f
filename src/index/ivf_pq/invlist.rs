//! Inverted-list storage for the IVF-PQ engine (C7/4.4.5).
//!
//! Two backends implement [`ListSource`]: [`InMemoryInvertedLists`], used
//! while building and by default when reading back a non-block-cache index,
//! and [`BlockCacheInvertedLists`], used when the meta asks for
//! `cache_index_block = true`. Both expose the same read contract so the
//! scan loop in [`super::IvfPqIndex`] doesn't need to know which one backs
//! a given list.

use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::Read as _;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::cache::{BlockCache, BlockKey, CachePriority};
use crate::error::{Error, Result};

/// Read-only access to one inverted list's codes, ids, and reconstruction
/// errors, regardless of whether the backing storage is fully resident or
/// lazily block-loaded.
pub trait ListSource: Send + Sync {
    /// Number of inverted lists (`nlist`).
    fn nlist(&self) -> usize;
    /// Number of entries currently in list `k`.
    fn list_size(&self, k: usize) -> usize;
    /// Owned copy of list `k`'s packed codes (`list_size(k) * code_size`
    /// bytes).
    fn codes(&self, k: usize) -> Vec<u8>;
    /// Owned copy of list `k`'s ids, `list_size(k)` entries.
    fn ids(&self, k: usize) -> Vec<i64>;
    /// List `k`'s per-entry reconstruction errors, `list_size(k)` entries.
    fn reconstruction_errors(&self, k: usize) -> &[f32];
    /// Downcasts to [`InMemoryInvertedLists`] when that's the concrete
    /// backend, for mutation during build and for the codec's base writer
    /// (which only ever serializes a fully resident builder-side index).
    fn as_any(&self) -> Option<&InMemoryInvertedLists> {
        None
    }
    /// Mutable counterpart of [`Self::as_any`], used by `add_with_ids`.
    fn as_any_mut(&mut self) -> Option<&mut InMemoryInvertedLists> {
        None
    }
}

/// Fully resident inverted lists: a flat builder/in-memory backend and the
/// default representation produced by training and `add_with_ids`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInvertedLists {
    code_size: usize,
    codes: Vec<Vec<u8>>,
    ids: Vec<Vec<i64>>,
    reconstruction_errors: Vec<Vec<f32>>,
}

impl InMemoryInvertedLists {
    /// Builds `nlist` empty lists for codes of `code_size` bytes each.
    #[must_use]
    pub fn new(nlist: usize, code_size: usize) -> Self {
        Self {
            code_size,
            codes: vec![Vec::new(); nlist],
            ids: vec![Vec::new(); nlist],
            reconstruction_errors: vec![Vec::new(); nlist],
        }
    }

    /// Appends one `(code, id, reconstruction_error)` entry to list `k`.
    ///
    /// # Panics
    ///
    /// Panics if `code.len() != code_size`.
    pub fn push(&mut self, k: usize, code: &[u8], id: i64, reconstruction_error: f32) {
        assert_eq!(code.len(), self.code_size, "invlist: code size mismatch");
        self.codes[k].extend_from_slice(code);
        self.ids[k].push(id);
        self.reconstruction_errors[k].push(reconstruction_error);
    }

    /// Code width in bytes.
    #[must_use]
    pub const fn code_size(&self) -> usize {
        self.code_size
    }

    /// Rebuilds fully resident lists from codec-read per-list vectors (the
    /// `ilar` base format).
    #[must_use]
    pub fn from_parts(
        code_size: usize,
        codes: Vec<Vec<u8>>,
        ids: Vec<Vec<i64>>,
        reconstruction_errors: Vec<Vec<f32>>,
    ) -> Self {
        Self {
            code_size,
            codes,
            ids,
            reconstruction_errors,
        }
    }

    /// Checks the spec's length invariant: every list's reconstruction-error
    /// vector has exactly as many entries as the list itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] (fatal) on the first mismatched list.
    pub fn check_invariants(&self) -> Result<()> {
        for k in 0..self.codes.len() {
            let entries = self.ids[k].len();
            if self.reconstruction_errors[k].len() != entries {
                return Err(Error::Internal(format!(
                    "list {k}: reconstruction_errors len {} != list size {entries}",
                    self.reconstruction_errors[k].len()
                )));
            }
            if self.codes[k].len() != entries * self.code_size {
                return Err(Error::Internal(format!(
                    "list {k}: codes len {} != {entries} * code_size {}",
                    self.codes[k].len(),
                    self.code_size
                )));
            }
        }
        Ok(())
    }
}

impl ListSource for InMemoryInvertedLists {
    fn nlist(&self) -> usize {
        self.codes.len()
    }

    fn list_size(&self, k: usize) -> usize {
        self.ids[k].len()
    }

    fn codes(&self, k: usize) -> Vec<u8> {
        self.codes[k].clone()
    }

    fn ids(&self, k: usize) -> Vec<i64> {
        self.ids[k].clone()
    }

    fn reconstruction_errors(&self, k: usize) -> &[f32] {
        &self.reconstruction_errors[k]
    }

    fn as_any(&self) -> Option<&Self> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut Self> {
        Some(self)
    }
}

/// Per-list descriptor recorded at open time for a block-cache index:
/// byte offset and entry count within the codec's `ilbc` body.
#[derive(Debug, Clone, Copy)]
pub struct ListDescriptor {
    /// Byte offset of this list's `codes || ids` region within the file.
    pub byte_offset: u64,
    /// Number of entries in this list.
    pub entry_count: u32,
}

/// Lazily block-loaded inverted lists (C7/4.4.5): codes and ids stay on
/// disk at their recorded offsets; a list access 4 KiB-aligns the
/// `[offset, offset + entry_count * (code_size + 8))` window, looks it up
/// in the shared [`BlockCache`], and on miss performs one aligned `pread`
/// (falling back to a plain positioned read if the file wasn't opened
/// `O_DIRECT`).
pub struct BlockCacheInvertedLists {
    file: File,
    file_key: u64,
    code_size: usize,
    block_size: u64,
    lists: Vec<ListDescriptor>,
    reconstruction_errors: Vec<Vec<f32>>,
    cache: Arc<BlockCache>,
}

impl BlockCacheInvertedLists {
    /// Opens `path` for block-cache reads, preferring `O_DIRECT` and
    /// falling back to a buffered open if the platform/filesystem rejects
    /// it (`O_DIRECT` is an optimization, not a correctness requirement).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened at all.
    pub fn open(
        path: &Path,
        code_size: usize,
        block_size: u64,
        lists: Vec<ListDescriptor>,
        reconstruction_errors: Vec<Vec<f32>>,
        cache: Arc<BlockCache>,
    ) -> Result<Self> {
        let file = open_direct_or_buffered(path)?;
        let file_key = file_cache_key(path);
        Ok(Self {
            file,
            file_key,
            code_size,
            block_size,
            lists,
            reconstruction_errors,
            cache,
        })
    }

    fn window(&self, k: usize) -> Result<(Arc<Vec<u8>>, u64)> {
        let desc = self.lists[k];
        let entries = desc.entry_count as u64;
        let span = entries * (self.code_size as u64 + 8);
        let aligned_offset = desc.byte_offset - (desc.byte_offset % self.block_size);
        let end = desc.byte_offset + span;
        let aligned_end = end.div_ceil(self.block_size) * self.block_size;
        let window_len = aligned_end - aligned_offset;
        let skew = desc.byte_offset - aligned_offset;

        let key = BlockKey {
            file_key: self.file_key,
            list_no: k as u32,
        };
        if let Some(buf) = self.cache.get(&key) {
            return Ok((buf, skew));
        }

        let buf = read_aligned_window(&self.file, aligned_offset, window_len as usize)?;
        let stored = self.cache.insert(key, buf, CachePriority::Normal);
        Ok((stored, skew))
    }
}

impl ListSource for BlockCacheInvertedLists {
    fn nlist(&self) -> usize {
        self.lists.len()
    }

    fn list_size(&self, k: usize) -> usize {
        self.lists[k].entry_count as usize
    }

    fn codes(&self, k: usize) -> Vec<u8> {
        let entries = self.list_size(k);
        let (window, skew) = self.window(k).unwrap_or_else(|_| (Arc::new(Vec::new()), 0));
        let start = skew as usize;
        let len = entries * self.code_size;
        window.get(start..start + len).map_or_else(Vec::new, <[u8]>::to_vec)
    }

    fn ids(&self, k: usize) -> Vec<i64> {
        let entries = self.list_size(k);
        let (window, skew) = self.window(k).unwrap_or_else(|_| (Arc::new(Vec::new()), 0));
        let start = skew as usize + entries * self.code_size;
        let Some(bytes) = window.get(start..start + entries * 8) else {
            return Vec::new();
        };
        bytes
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(c.try_into().expect("chunk is 8 bytes")))
            .collect()
    }

    fn reconstruction_errors(&self, k: usize) -> &[f32] {
        &self.reconstruction_errors[k]
    }
}

#[cfg(unix)]
fn open_direct_or_buffered(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    let direct = File::options()
        .read(true)
        .custom_flags(libc::O_DIRECT)
        .open(path);
    match direct {
        Ok(f) => Ok(f),
        Err(e) if e.raw_os_error() == Some(libc::EINVAL) => {
            tracing::debug!("O_DIRECT rejected for {}; falling back to buffered open", path.display());
            Ok(File::open(path)?)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn open_direct_or_buffered(path: &Path) -> Result<File> {
    Ok(File::open(path)?)
}

fn file_cache_key(path: &Path) -> u64 {
    let mut hasher = FxHasher::default();
    path.hash(&mut hasher);
    if let Ok(meta) = std::fs::metadata(path) {
        if let Ok(modified) = meta.modified() {
            modified.hash(&mut hasher);
        }
    }
    hasher.finish()
}

#[cfg(unix)]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)?;
    Ok(())
}

#[cfg(not(unix))]
fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    use std::io::{Seek, SeekFrom};
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)?;
    Ok(())
}

/// Direct I/O alignment, independent of the logical block size used for
/// windowing (which is always a multiple of this).
const DIRECT_IO_ALIGN: usize = 4096;

/// Reads `len` bytes at `offset` into a scratch buffer aligned to
/// [`DIRECT_IO_ALIGN`] (so `O_DIRECT` opens get a properly aligned
/// destination), then copies the result into a plain `Vec<u8>` for cache
/// storage. The aligned scratch buffer itself is freed once this call
/// returns; only its contents are retained.
fn read_aligned_window(file: &File, offset: u64, len: usize) -> Result<Vec<u8>> {
    let layout = std::alloc::Layout::from_size_align(len.max(1), DIRECT_IO_ALIGN)
        .map_err(|e| Error::Internal(format!("block cache: invalid aligned layout: {e}")))?;
    let guard = crate::alloc_guard::AllocGuard::new(layout).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::OutOfMemory,
            "aligned block-cache allocation failed",
        ))
    })?;
    // SAFETY: `guard` owns `layout.size()` freshly allocated, unwritten
    // bytes for the lifetime of this scope; we zero-init before handing a
    // `&mut [u8]` view of the same extent to `read_at`.
    let scratch = unsafe {
        std::ptr::write_bytes(guard.as_ptr(), 0, layout.size());
        std::slice::from_raw_parts_mut(guard.as_ptr(), len)
    };
    read_at(file, offset, scratch)?;
    Ok(scratch.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn in_memory_round_trips_and_checks_invariants() {
        let mut lists = InMemoryInvertedLists::new(2, 4);
        lists.push(0, &[1, 2, 3, 4], 10, 0.5);
        lists.push(0, &[5, 6, 7, 8], 11, 0.25);
        lists.push(1, &[9, 9, 9, 9], 20, 1.0);
        assert_eq!(lists.list_size(0), 2);
        assert_eq!(lists.ids(0), vec![10, 11]);
        assert_eq!(lists.codes(0), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(lists.reconstruction_errors(0), &[0.5, 0.25]);
        lists.check_invariants().expect("invariants hold");
    }

    #[test]
    fn block_cache_reads_codes_and_ids_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("list.bin");
        let code_size = 4usize;
        let entries = 3u32;
        let mut body = Vec::new();
        // codes
        body.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        // ids
        for id in [100i64, 200, 300] {
            body.extend_from_slice(&id.to_le_bytes());
        }
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&body)
            .unwrap();

        let cache = Arc::new(crate::cache::SharedCache::new(1 << 20, 1));
        let lists = vec![ListDescriptor {
            byte_offset: 0,
            entry_count: entries,
        }];
        let reader = BlockCacheInvertedLists::open(
            &path,
            code_size,
            4096,
            lists,
            vec![vec![0.1, 0.2, 0.3]],
            cache,
        )
        .expect("open");

        assert_eq!(reader.list_size(0), 3);
        assert_eq!(reader.codes(0), &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(reader.ids(0), vec![100, 200, 300]);
        assert_eq!(reader.reconstruction_errors(0), &[0.1, 0.2, 0.3]);
    }
}
