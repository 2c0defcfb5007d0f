//! # `vindex-core`
//!
//! An embeddable approximate-nearest-neighbor vector-index library: HNSW
//! and IVF-PQ index families behind one factory/contract surface, with a
//! process-wide sharded LRU cache, a versioned binary codec, and a
//! reconstruction-error-bounded range search unique to the IVF-PQ engine.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use vindex_core::{IndexMeta, IndexFamily, IndexType, Section, contract};
//!
//! let mut meta = IndexMeta::new(IndexFamily::Vector, IndexType::FaissHNSW);
//! meta.set(Section::Common, "dim", 128);
//! meta.set(Section::Common, "metric_type", "cosine_similarity");
//!
//! let mut builder = contract::create_builder(meta)?;
//! builder.open()?;
//! // builder.add(column, None, None)?;
//! builder.flush(false, None)?;
//! # Ok::<(), vindex_core::Error>(())
//! ```
//!
//! ## Module map
//!
//! - [`meta`] — the versioned `IndexMeta` parameter bag exchanged with the factory.
//! - [`contract`] — `IndexBuilder`/`IndexWriter`/`IndexReader`/`AnnSearcher` and their factories.
//! - [`index`] — the tagged-union `Index` handle over the HNSW and IVF-PQ engines.
//! - [`codec`] — the versioned on-disk format for IVF-PQ handles.
//! - [`cache`] — the sharded LRU cache and its process-wide default instances.
//! - [`distance`] — the metric enum and the cosine↔L2 adapter math shared by both engines.
//! - [`id_filter`] / [`id_map`] — search-time membership predicates and custom row-id mapping.
//! - [`vector_view`] — zero-copy sequence views over caller-owned builder input.
//! - [`config`] — layered process-wide configuration (cache sizing, I/O, parallelism).
//! - [`error`] — the crate-wide `Error`/`Result` types.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alloc_guard;
pub mod cache;
pub mod codec;
pub mod config;
pub mod contract;
pub mod distance;
pub mod error;
pub mod id_filter;
pub mod id_map;
pub mod index;
pub mod meta;
pub mod simd_dispatch;
pub mod vector_view;

pub use contract::{AnnSearcher, BuilderState, IndexBuilder, IndexReader, IndexWriter, SearcherState};
pub use distance::Metric;
pub use error::{Error, Result};
pub use id_filter::IdFilter;
pub use index::Index;
pub use meta::{IndexFamily, IndexMeta, IndexType, Section};
