//! Writer / Reader / Builder / Searcher contracts (C5): the uniform
//! open/add/flush/close and read/search lifecycle, family-dispatched via a
//! factory keyed by [`IndexType`](crate::meta::IndexType).
//!
//! The five object types exposed at the crate root (§6) are [`IndexMeta`],
//! [`IndexBuilder`], [`IndexWriter`], [`IndexReader`], and [`AnnSearcher`].
//! Meta construction is by named-setter chaining or JSON/MessagePack
//! deserialization (see [`crate::meta`]); factories here take a meta and
//! return the concrete implementation appropriate for its `index_type`.

mod builder;
mod extra;
mod factory;
mod reader;
mod searcher;
mod writer;

pub use builder::{BuilderState, IndexBuilder};
pub use factory::{
    create_builder, create_builder_with_cache, create_reader, create_reader_with_caches,
    create_searcher, create_writer,
};
pub use reader::IndexReader;
pub use searcher::{AnnSearcher, SearcherState};
pub use writer::IndexWriter;
