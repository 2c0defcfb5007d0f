//! Permutation from internal sequential ids to caller-supplied row ids.
//!
//! Installed on an index only when the builder was opened with
//! `use_custom_row_id`; otherwise the internal sequential id *is* the
//! external id and no map is consulted.

use rustc_hash::FxHashMap;

/// Bidirectional internal-index ↔ external-row-id mapping.
#[derive(Debug, Default, Clone)]
pub struct IdMap {
    internal_to_external: Vec<i64>,
    external_to_internal: FxHashMap<i64, usize>,
}

impl IdMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new `(internal, external)` pair; `internal` must equal
    /// `self.len()` (ids are assigned densely in insertion order).
    pub fn push(&mut self, external: i64) {
        let internal = self.internal_to_external.len();
        self.internal_to_external.push(external);
        self.external_to_internal.insert(external, internal);
    }

    /// Number of mapped rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.internal_to_external.len()
    }

    /// Whether the map holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.internal_to_external.is_empty()
    }

    /// Translates an internal sequential id to its external row id.
    #[must_use]
    pub fn to_external(&self, internal: usize) -> Option<i64> {
        self.internal_to_external.get(internal).copied()
    }

    /// Translates an external row id back to its internal sequential id.
    #[must_use]
    pub fn to_internal(&self, external: i64) -> Option<usize> {
        self.external_to_internal.get(&external).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_both_directions() {
        let mut map = IdMap::new();
        map.push(100);
        map.push(7);
        map.push(42);

        assert_eq!(map.to_external(0), Some(100));
        assert_eq!(map.to_external(2), Some(42));
        assert_eq!(map.to_internal(7), Some(1));
        assert_eq!(map.to_internal(999), None);
        assert_eq!(map.len(), 3);
    }
}
