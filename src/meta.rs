//! Versioned, serializable index parameter descriptor.
//!
//! [`IndexMeta`] is the single object exchanged between a caller and the
//! factory: it names the index family/type and carries four parameter
//! sections (`common`, `index`, `search`, `extra`) as untyped JSON, with
//! typed required/optional getters layered on top. It round-trips losslessly
//! through both MessagePack and JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::Path;

use crate::distance::Metric;
use crate::error::{Error, Result};

/// Top-level index family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFamily {
    /// Dense vector index.
    Vector,
    /// Inverted-text index (not implemented by this crate; accepted for
    /// meta round-tripping and rejected by the factory).
    Text,
}

/// Concrete index implementation selected within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    /// HNSW graph index (faiss-style naming retained for interop).
    FaissHNSW,
    /// Flat (unquantized) inverted-file index.
    FaissIVFFlat,
    /// Inverted-file index with product quantization.
    FaissIVFPQ,
}

/// The four named parameter sections of an [`IndexMeta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Parameters shared by build and search (dimension, metric, ...).
    Common,
    /// Build-time parameters (`M`, `nlist`, ...).
    Index,
    /// Search-time parameters (`efSearch`, `nprobe`, ...).
    Search,
    /// Writer/reader options (cache keys, overwrite flags, ...).
    Extra,
}

impl Section {
    const fn key(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Index => "index",
            Self::Search => "search",
            Self::Extra => "extra",
        }
    }
}

/// A versioned, serializable bag of index parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Format version of this meta structure itself.
    pub meta_version: i32,
    /// Top-level family (vector vs. text).
    pub index_family: IndexFamily,
    /// Concrete implementation.
    pub index_type: IndexType,
    /// Parameters shared by build and search.
    pub common: BTreeMap<String, Json>,
    /// Build-time parameters.
    pub index: BTreeMap<String, Json>,
    /// Search-time parameters.
    pub search: BTreeMap<String, Json>,
    /// Writer/reader options.
    pub extra: BTreeMap<String, Json>,
}

impl IndexMeta {
    /// The meta format version produced by this implementation.
    pub const CURRENT_VERSION: i32 = 1;

    /// Creates an empty meta for the given family/type.
    #[must_use]
    pub fn new(index_family: IndexFamily, index_type: IndexType) -> Self {
        Self {
            meta_version: Self::CURRENT_VERSION,
            index_family,
            index_type,
            common: BTreeMap::new(),
            index: BTreeMap::new(),
            search: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    fn section_map(&self, section: Section) -> &BTreeMap<String, Json> {
        match section {
            Section::Common => &self.common,
            Section::Index => &self.index,
            Section::Search => &self.search,
            Section::Extra => &self.extra,
        }
    }

    fn section_map_mut(&mut self, section: Section) -> &mut BTreeMap<String, Json> {
        match section {
            Section::Common => &mut self.common,
            Section::Index => &mut self.index,
            Section::Search => &mut self.search,
            Section::Extra => &mut self.extra,
        }
    }

    /// Sets a key within `section` to `value`.
    pub fn set<V: Serialize>(&mut self, section: Section, key: &str, value: V) {
        let json = serde_json::to_value(value).expect("value must be JSON-serializable");
        self.section_map_mut(section).insert(key.to_string(), json);
    }

    /// Fetches and deserializes a required key from `section`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParam`] if absent, [`Error::InvalidParam`] if
    /// present but not deserializable as `V`.
    pub fn required<V: for<'de> Deserialize<'de>>(&self, section: Section, key: &str) -> Result<V> {
        let raw = self
            .section_map(section)
            .get(key)
            .ok_or_else(|| Error::MissingParam {
                section: section.key(),
                key: key.to_string(),
            })?;
        serde_json::from_value(raw.clone()).map_err(|e| Error::InvalidParam {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetches and deserializes an optional key from `section`, returning
    /// `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParam`] if present but not deserializable as `V`.
    pub fn optional<V: for<'de> Deserialize<'de>>(
        &self,
        section: Section,
        key: &str,
    ) -> Result<Option<V>> {
        match self.section_map(section).get(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| Error::InvalidParam {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Required `common.dim`.
    ///
    /// # Errors
    ///
    /// Returns an error if missing, non-positive, or of the wrong type.
    pub fn dim(&self) -> Result<usize> {
        let dim: i64 = self.required(Section::Common, "dim")?;
        if dim <= 0 {
            return Err(Error::InvalidParam {
                key: "dim".to_string(),
                reason: format!("must be > 0, got {dim}"),
            });
        }
        Ok(dim as usize)
    }

    /// Required `common.metric_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if missing or of the wrong type.
    pub fn metric(&self) -> Result<Metric> {
        self.required(Section::Common, "metric_type")
    }

    /// Optional `common.is_vector_normed`, defaulting to `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if present but not a bool.
    pub fn is_vector_normed(&self) -> Result<bool> {
        Ok(self
            .optional::<bool>(Section::Common, "is_vector_normed")?
            .unwrap_or(false))
    }

    /// Checks structural integrity: required common parameters are present
    /// and well-formed. Family-specific checks (`nlist`, `M`, ...) are
    /// performed by the corresponding builder at `open` time, since their
    /// required-ness depends on `index_type`.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn check_integrity(&self) -> Result<()> {
        self.dim()?;
        self.metric()?;
        if self.meta_version > Self::CURRENT_VERSION {
            return Err(Error::InvalidParam {
                key: "meta_version".to_string(),
                reason: format!(
                    "meta_version {} is newer than supported version {}",
                    self.meta_version,
                    Self::CURRENT_VERSION
                ),
            });
        }
        Ok(())
    }

    /// Serializes to MessagePack bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on serialization failure.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserializes from MessagePack bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on malformed input.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Serializes to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on serialization failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on malformed input.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Writes the MessagePack encoding to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Codec`] on failure.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_msgpack()?)?;
        Ok(())
    }

    /// Reads the MessagePack encoding from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Codec`] on failure.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_msgpack(&bytes)
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
