//! Native HNSW graph implementation (C6).
//!
//! A from-scratch hierarchical navigable small world graph, generic over a
//! [`DistanceEngine`] so both scalar and SIMD-dispatched kernels can drive
//! the same insert/search logic.
//!
//! # References
//!
//! - Malkov & Yashunin, "Efficient and robust approximate nearest neighbor
//!   search using Hierarchical Navigable Small World graphs", arXiv:1603.09320

mod distance;
mod graph;
mod layer;
mod ordered_float;

pub use distance::{CpuDistance, DistanceEngine, SimdDistance};
pub use graph::NativeHnsw;
pub use layer::{Layer, NodeId};

#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod ordered_float_tests;
