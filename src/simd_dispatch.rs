//! Zero-overhead SIMD distance dispatch (C12, ambient).
//!
//! Resolves L2, cosine, dot-product, and Hamming kernels to the best
//! available backend once per process via `OnceLock`, then calls through a
//! plain function pointer thereafter — no per-call feature checks in the
//! hot loop. The SIMD backend itself is the portable `wide` crate (8-wide
//! `f32x8` lanes), which auto-vectorizes to SSE/AVX2/NEON under the hood
//! without this crate hand-rolling per-architecture intrinsics.
//!
//! Both the HNSW adapter's graph traversal
//! ([`crate::index::hnsw::native::distance::SimdDistance`]) and the IVF-PQ
//! engine's coarse-quantizer/PQ-table construction are free to route through
//! this table; it is purely a performance substrate and has no bearing on
//! any component's observable contract (§4.11).

use std::sync::OnceLock;
use wide::f32x8;

type DistanceFn = fn(&[f32], &[f32]) -> f32;
type BinaryDistanceFn = fn(&[f32], &[f32]) -> u32;

/// CPU SIMD features detected for this process, surfaced for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimdFeatures {
    /// Whether the portable `wide` backend is in use (always true today;
    /// kept as a field so a future native-intrinsics backend can report
    /// `false` here without changing the type's shape).
    pub wide_backend: bool,
}

impl SimdFeatures {
    /// Detects the SIMD backend in use for this process.
    #[must_use]
    pub const fn detect() -> Self {
        Self { wide_backend: true }
    }
}

/// Returns the detected SIMD feature set.
#[must_use]
pub fn simd_features_info() -> SimdFeatures {
    SimdFeatures::detect()
}

static DOT_PRODUCT_FN: OnceLock<DistanceFn> = OnceLock::new();
static EUCLIDEAN_FN: OnceLock<DistanceFn> = OnceLock::new();
static COSINE_FN: OnceLock<DistanceFn> = OnceLock::new();
static COSINE_NORMALIZED_FN: OnceLock<DistanceFn> = OnceLock::new();
static HAMMING_FN: OnceLock<BinaryDistanceFn> = OnceLock::new();

/// Dot product of `a` and `b`, dispatched through the cached SIMD backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn dot_product_dispatched(a: &[f32], b: &[f32]) -> f32 {
    (*DOT_PRODUCT_FN.get_or_init(|| dot_product_wide as DistanceFn))(a, b)
}

/// Euclidean (non-squared) distance between `a` and `b`, dispatched through
/// the cached SIMD backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn euclidean_dispatched(a: &[f32], b: &[f32]) -> f32 {
    (*EUCLIDEAN_FN.get_or_init(|| euclidean_wide as DistanceFn))(a, b)
}

/// Cosine similarity between `a` and `b`, dispatched through the cached
/// SIMD backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn cosine_dispatched(a: &[f32], b: &[f32]) -> f32 {
    (*COSINE_FN.get_or_init(|| cosine_wide as DistanceFn))(a, b)
}

/// Cosine similarity between two already-unit-norm vectors (skips the
/// normalization divide), dispatched through the cached SIMD backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn cosine_normalized_dispatched(a: &[f32], b: &[f32]) -> f32 {
    (*COSINE_NORMALIZED_FN.get_or_init(|| dot_product_wide as DistanceFn))(a, b)
}

/// Hamming distance between the sign bits of `a` and `b`, dispatched
/// through the cached SIMD backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn hamming_dispatched(a: &[f32], b: &[f32]) -> u32 {
    (*HAMMING_FN.get_or_init(|| hamming_scalar as BinaryDistanceFn))(a, b)
}

/// Issues a software prefetch hint for `ptr`, used by the HNSW graph
/// traversal to hide memory latency when following neighbor-list edges. A
/// no-op on architectures without a prefetch intrinsic.
#[inline]
pub fn prefetch_distance<T>(ptr: *const T) {
    #[cfg(target_arch = "x86_64")]
    {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        // SAFETY: `_mm_prefetch` never dereferences `ptr`; an invalid or
        // dangling pointer makes this a performance no-op, not unsound.
        unsafe {
            _mm_prefetch(ptr.cast::<i8>(), _MM_HINT_T0);
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = ptr;
    }
}

fn dot_product_wide(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "simd dot product: length mismatch");
    let mut acc = f32x8::ZERO;
    let mut chunks_a = a.chunks_exact(8);
    let mut chunks_b = b.chunks_exact(8);
    for (ca, cb) in chunks_a.by_ref().zip(chunks_b.by_ref()) {
        acc += f32x8::from(<[f32; 8]>::try_from(ca).expect("chunk is 8 wide"))
            * f32x8::from(<[f32; 8]>::try_from(cb).expect("chunk is 8 wide"));
    }
    let mut total: f32 = acc.as_array_ref().iter().sum();
    for (x, y) in chunks_a.remainder().iter().zip(chunks_b.remainder()) {
        total += x * y;
    }
    total
}

fn squared_l2_wide(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "simd squared l2: length mismatch");
    let mut acc = f32x8::ZERO;
    let mut chunks_a = a.chunks_exact(8);
    let mut chunks_b = b.chunks_exact(8);
    for (ca, cb) in chunks_a.by_ref().zip(chunks_b.by_ref()) {
        let va = f32x8::from(<[f32; 8]>::try_from(ca).expect("chunk is 8 wide"));
        let vb = f32x8::from(<[f32; 8]>::try_from(cb).expect("chunk is 8 wide"));
        let diff = va - vb;
        acc += diff * diff;
    }
    let mut total: f32 = acc.as_array_ref().iter().sum();
    for (x, y) in chunks_a.remainder().iter().zip(chunks_b.remainder()) {
        total += (x - y) * (x - y);
    }
    total
}

fn euclidean_wide(a: &[f32], b: &[f32]) -> f32 {
    squared_l2_wide(a, b).sqrt()
}

fn cosine_wide(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product_wide(a, b);
    let norm_a = dot_product_wide(a, a).sqrt();
    let norm_b = dot_product_wide(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn hamming_scalar(a: &[f32], b: &[f32]) -> u32 {
    assert_eq!(a.len(), b.len(), "simd hamming: length mismatch");
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.is_sign_negative() != y.is_sign_negative())
        .count() as u32
}

#[cfg(test)]
#[path = "simd_dispatch_tests.rs"]
mod tests;
