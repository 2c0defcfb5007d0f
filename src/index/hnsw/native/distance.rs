//! Pluggable distance engines for the native HNSW graph (C6/C12).
//!
//! [`NativeHnsw`](super::graph::NativeHnsw) is generic over a [`DistanceEngine`]
//! so the graph-construction/search algorithms stay oblivious to which kernel
//! computes a pairwise distance. [`CpuDistance`] wraps the crate-wide
//! [`Metric`](crate::distance::Metric) adapter directly; [`SimdDistance`]
//! dispatches through the cached SIMD function-pointer table instead of
//! `Metric::calculate`'s scalar loops.

use crate::distance::Metric;
use crate::simd_dispatch::{cosine_dispatched, dot_product_dispatched, euclidean_dispatched};

/// A pairwise distance/dissimilarity kernel over `f32` vectors.
///
/// Lower return values must mean "more similar": metrics whose native
/// direction is "higher is better" (cosine similarity, inner product) are
/// negated so the graph's min-heap search logic is metric-agnostic.
pub trait DistanceEngine: Send + Sync {
    /// Computes the (possibly negated) distance between `a` and `b`.
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Scalar distance engine backed directly by [`Metric::calculate`].
#[derive(Debug, Clone, Copy)]
pub struct CpuDistance {
    metric: Metric,
}

impl CpuDistance {
    /// Wraps `metric` as a graph-search distance engine.
    #[must_use]
    pub const fn new(metric: Metric) -> Self {
        Self { metric }
    }
}

impl DistanceEngine for CpuDistance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        to_ascending(self.metric, self.metric.calculate(a, b))
    }
}

/// Distance engine backed by the process-wide SIMD dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct SimdDistance {
    metric: Metric,
}

impl SimdDistance {
    /// Wraps `metric` as a SIMD-dispatched graph-search distance engine.
    #[must_use]
    pub const fn new(metric: Metric) -> Self {
        Self { metric }
    }
}

impl DistanceEngine for SimdDistance {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let raw = match self.metric {
            Metric::L2 => {
                let d = euclidean_dispatched(a, b);
                return d * d;
            }
            Metric::CosineSimilarity | Metric::CosineDistance => cosine_dispatched(a, b),
            Metric::InnerProduct => dot_product_dispatched(a, b),
        };
        to_ascending(self.metric, raw)
    }
}

/// Converts a metric's native value into an ascending ("smaller is closer")
/// scale, since the graph heap always orders candidates by ascending distance.
fn to_ascending(metric: Metric, value: f32) -> f32 {
    if metric.higher_is_better() {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_is_negated_for_ascending_order() {
        let engine = CpuDistance::new(Metric::CosineSimilarity);
        let close = engine.distance(&[1.0, 0.0], &[1.0, 0.0]);
        let far = engine.distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(close < far, "closer vectors must sort first: {close} vs {far}");
    }

    #[test]
    fn l2_is_already_ascending() {
        let engine = CpuDistance::new(Metric::L2);
        let close = engine.distance(&[0.0, 0.0], &[0.1, 0.0]);
        let far = engine.distance(&[0.0, 0.0], &[10.0, 0.0]);
        assert!(close < far);
    }

    #[test]
    fn simd_and_cpu_agree_on_l2() {
        let a = [1.0_f32, 2.0, 3.0, 4.0];
        let b = [2.0_f32, 1.0, 0.0, 5.0];
        let cpu = CpuDistance::new(Metric::L2).distance(&a, &b);
        let simd = SimdDistance::new(Metric::L2).distance(&a, &b);
        assert!((cpu - simd).abs() < 1e-3, "cpu={cpu} simd={simd}");
    }
}
