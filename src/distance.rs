//! Distance metrics and the L2↔cosine adapter used to reconcile cosine
//! queries with an underlying L2 substrate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Distance/similarity metric selectable on an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean (L2) distance. Lower is more similar.
    L2,
    /// Cosine similarity in `[-1, 1]`. Higher is more similar.
    CosineSimilarity,
    /// Raw inner product. Higher is more similar.
    InnerProduct,
    /// `1 - cosine_similarity`, in `[0, 2]`. Lower is more similar.
    CosineDistance,
}

impl Metric {
    /// Computes the metric's native distance/similarity value between `a`
    /// and `b`.
    ///
    /// # Panics
    ///
    /// Panics if `a.len() != b.len()`.
    #[must_use]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        assert_eq!(a.len(), b.len(), "vector dimensions must match");
        match self {
            Self::L2 => squared_l2(a, b),
            Self::CosineSimilarity => cosine_similarity(a, b),
            Self::InnerProduct => dot_product(a, b),
            Self::CosineDistance => 1.0 - cosine_similarity(a, b),
        }
    }

    /// Whether higher values indicate more similarity under this metric.
    #[must_use]
    pub const fn higher_is_better(&self) -> bool {
        match self {
            Self::CosineSimilarity | Self::InnerProduct => true,
            Self::L2 | Self::CosineDistance => false,
        }
    }

    /// Whether this metric requires the index to carry an L2-normalization
    /// pre-transform when input vectors are not already unit-norm.
    #[must_use]
    pub const fn needs_normalization(&self) -> bool {
        matches!(self, Self::CosineSimilarity | Self::CosineDistance)
    }

    /// Whether range search is well-defined for this metric. Inner-product
    /// range search is rejected: there is no fixed relationship between raw
    /// dot-product magnitude and a meaningful radius.
    #[must_use]
    pub const fn supports_range_search(&self) -> bool {
        !matches!(self, Self::InnerProduct)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Converts a cosine-similarity range-search threshold into a squared-L2
/// radius, valid when the indexed vectors are unit-normalized.
///
/// `d = 2(1 - cos)` for unit vectors, so a query asking for `cos >= tau`
/// is equivalent to `l2_sq <= (1 - tau) * 2`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `tau` is outside `[-1, 1]`.
pub fn cosine_threshold_to_l2_radius(tau: f32) -> Result<f32> {
    if !(-1.0..=1.0).contains(&tau) {
        return Err(Error::InvalidArgument(format!(
            "cosine threshold {tau} out of range [-1, 1]"
        )));
    }
    Ok((1.0 - tau) * 2.0)
}

/// Converts a squared-L2 distance back to a cosine similarity, inverse of
/// [`cosine_threshold_to_l2_radius`].
#[must_use]
pub fn l2_to_cosine_similarity(l2_sq: f32) -> f32 {
    1.0 - l2_sq / 2.0
}

/// L2-normalizes `v` in place; a no-op on a zero vector.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
#[path = "distance_tests.rs"]
mod tests;
