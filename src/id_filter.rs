//! Id-filter abstraction (C9): a polymorphic membership predicate composed
//! into IVF-PQ and HNSW search at the call site.
//!
//! The source distinguished a newer "IdFilter" from an older "AnnFilter"
//! with overlapping responsibilities; this crate collapses them into the
//! single [`IdFilter`] trait below and keeps no alias for the older name,
//! since nothing in this codebase depends on it.

use roaring::RoaringBitmap;

use crate::error::{Error, Result};
use crate::id_map::IdMap;

/// Membership predicate over row ids, evaluated by every search path that
/// accepts an optional filter.
pub trait IdFilter: Send + Sync {
    /// Whether `id` passes this filter.
    fn is_member(&self, id: i64) -> bool;
}

/// Dense, contiguous `[min, max]` interval filter.
#[derive(Debug, Clone, Copy)]
pub struct RangeFilter {
    min: i64,
    max: i64,
    /// When true, callers may additionally use this range to bisect a
    /// sorted id list instead of testing every entry with `is_member`.
    pub assume_sorted: bool,
}

impl RangeFilter {
    /// Builds an inclusive `[min, max]` filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdFilter`] if `min > max`.
    pub fn new(min: i64, max: i64, assume_sorted: bool) -> Result<Self> {
        if min > max {
            return Err(Error::IdFilter(format!(
                "range filter: min {min} > max {max}"
            )));
        }
        Ok(Self {
            min,
            max,
            assume_sorted,
        })
    }
}

impl IdFilter for RangeFilter {
    fn is_member(&self, id: i64) -> bool {
        id >= self.min && id <= self.max
    }
}

/// Small explicit id set, checked by linear scan.
#[derive(Debug, Clone)]
pub struct ArrayFilter {
    ids: Vec<i64>,
}

impl ArrayFilter {
    /// Wraps `ids` as a linear-scan filter.
    #[must_use]
    pub fn new(ids: Vec<i64>) -> Self {
        Self { ids }
    }
}

impl IdFilter for ArrayFilter {
    fn is_member(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }
}

/// Large id set backed by a bloom filter fronting an exact hash set, for
/// filters too large for linear scan but where exact membership is still
/// required on a bloom hit.
pub struct BatchFilter {
    bloom: crate::cache::BloomFilter,
    exact: rustc_hash::FxHashSet<i64>,
}

impl BatchFilter {
    /// Builds a batch filter over `ids`, sized for a ~1% false-positive
    /// bloom pre-check.
    #[must_use]
    pub fn new(ids: Vec<i64>) -> Self {
        let bloom = crate::cache::BloomFilter::new(ids.len().max(1), 0.01);
        for id in &ids {
            bloom.insert(id);
        }
        Self {
            bloom,
            exact: ids.into_iter().collect(),
        }
    }
}

impl IdFilter for BatchFilter {
    fn is_member(&self, id: i64) -> bool {
        !self.bloom.definitely_not_contains(&id) && self.exact.contains(&id)
    }
}

/// Fixed-size bitmap membership filter, `size` bits wide.
pub struct BitmapFilter {
    bitmap: RoaringBitmap,
    size_bits: u64,
}

impl BitmapFilter {
    /// Builds a bitmap filter of `size_bits` bits; `set_ids` are the ids to
    /// mark as members.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdFilter`] if any id is negative or does not fit
    /// `u32` (the roaring bitmap's native id width).
    pub fn new(size_bits: u64, set_ids: &[i64]) -> Result<Self> {
        let mut bitmap = RoaringBitmap::new();
        for &id in set_ids {
            let bit = u32::try_from(id)
                .map_err(|_| Error::IdFilter(format!("bitmap filter: id {id} out of range")))?;
            bitmap.insert(bit);
        }
        Ok(Self { bitmap, size_bits })
    }
}

impl IdFilter for BitmapFilter {
    fn is_member(&self, id: i64) -> bool {
        if id < 0 {
            return false;
        }
        let bit = id as u64;
        if bit / 8 >= self.size_bits / 8 {
            return false;
        }
        u32::try_from(id).is_ok_and(|b| self.bitmap.contains(b))
    }
}

/// Composes an [`IdFilter`] evaluated against internal ids with an
/// [`IdMap`], so the filter's predicate runs against the mapped external
/// id as the spec requires for custom-row-id indexes.
pub struct MappedFilter<'a> {
    inner: &'a dyn IdFilter,
    id_map: &'a IdMap,
}

impl<'a> MappedFilter<'a> {
    /// Wraps `inner` to evaluate against ids resolved through `id_map`.
    #[must_use]
    pub fn new(inner: &'a dyn IdFilter, id_map: &'a IdMap) -> Self {
        Self { inner, id_map }
    }
}

impl IdFilter for MappedFilter<'_> {
    fn is_member(&self, internal_id: i64) -> bool {
        let Ok(internal) = usize::try_from(internal_id) else {
            return false;
        };
        match self.id_map.to_external(internal) {
            Some(external) => self.inner.is_member(external),
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "id_filter_tests.rs"]
mod tests;
