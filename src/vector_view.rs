//! Zero-copy sequence-view abstraction over caller-owned column data.
//!
//! Builder input columns arrive as one of three shapes (the data model's
//! "sequence views"): a dense row-major array of fixed-width rows, a
//! variable-array view with an offsets table (whose rows must all equal the
//! declared dimension for vector data), or a flat primitive array (ids, null
//! flags). Only `f32` elements are accepted for vector data.

use crate::error::{Error, Result};

/// A dense, row-major view of `size` rows of `dim` `f32` elements each.
#[derive(Debug, Clone, Copy)]
pub struct FixedArrayView<'a> {
    data: &'a [f32],
    dim: usize,
    size: usize,
}

impl<'a> FixedArrayView<'a> {
    /// Builds a view over `data`, requiring `data.len() == dim * size`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the buffer length does not match.
    pub fn new(data: &'a [f32], dim: usize, size: usize) -> Result<Self> {
        if data.len() != dim * size {
            return Err(Error::InvalidArgument(format!(
                "fixed array view: expected {} elements ({dim} x {size}), got {}",
                dim * size,
                data.len()
            )));
        }
        Ok(Self { data, dim, size })
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Whether there are zero rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Dimension of each row.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Returns row `i` as a slice.
    #[must_use]
    pub fn row(&self, i: usize) -> &'a [f32] {
        let start = i * self.dim;
        &self.data[start..start + self.dim]
    }
}

/// A view of `size` variable-length rows addressed by an `offsets` table of
/// length `size + 1`, where row `i` occupies `data[offsets[i]..offsets[i+1]]`.
#[derive(Debug, Clone, Copy)]
pub struct VariableArrayView<'a> {
    data: &'a [f32],
    offsets: &'a [usize],
    size: usize,
}

impl<'a> VariableArrayView<'a> {
    /// Builds a view, requiring `offsets.len() == size + 1` and a non-decreasing,
    /// in-bounds offsets table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the offsets table is malformed.
    pub fn new(data: &'a [f32], offsets: &'a [usize], size: usize) -> Result<Self> {
        if offsets.len() != size + 1 {
            return Err(Error::InvalidArgument(format!(
                "variable array view: expected {} offsets, got {}",
                size + 1,
                offsets.len()
            )));
        }
        for w in offsets.windows(2) {
            if w[1] < w[0] {
                return Err(Error::InvalidArgument(
                    "variable array view: offsets must be non-decreasing".into(),
                ));
            }
        }
        if offsets.last().copied().unwrap_or(0) > data.len() {
            return Err(Error::InvalidArgument(
                "variable array view: offsets exceed data length".into(),
            ));
        }
        Ok(Self {
            data,
            offsets,
            size,
        })
    }

    /// Asserts every row has the declared `dim`, as required when this view
    /// carries vector data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on the first row that disagrees.
    pub fn assert_uniform_dim(&self, dim: usize) -> Result<()> {
        for i in 0..self.size {
            let actual = self.offsets[i + 1] - self.offsets[i];
            if actual != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// Whether there are zero rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns row `i` as a slice.
    #[must_use]
    pub fn row(&self, i: usize) -> &'a [f32] {
        &self.data[self.offsets[i]..self.offsets[i + 1]]
    }
}

/// A flat view of `size` scalar elements (ids, null flags, raw columns).
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveView<'a, T> {
    data: &'a [T],
}

impl<'a, T> PrimitiveView<'a, T> {
    /// Wraps `data` as a primitive view.
    #[must_use]
    pub const fn new(data: &'a [T]) -> Self {
        Self { data }
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are zero elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying slice.
    #[must_use]
    pub const fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

/// A column of vector rows, in either fixed- or variable-array shape.
#[derive(Debug, Clone, Copy)]
pub enum VectorColumn<'a> {
    /// Dense, uniform-width rows.
    Fixed(FixedArrayView<'a>),
    /// Variable-offset rows; callers must enforce a uniform dimension for
    /// vector data via [`VariableArrayView::assert_uniform_dim`].
    Variable(VariableArrayView<'a>),
}

impl<'a> VectorColumn<'a> {
    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Fixed(v) => v.len(),
            Self::Variable(v) => v.len(),
        }
    }

    /// Whether there are zero rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        match self {
            Self::Fixed(v) => v.is_empty(),
            Self::Variable(v) => v.is_empty(),
        }
    }

    /// Returns row `i` as a slice.
    #[must_use]
    pub fn row(&self, i: usize) -> &'a [f32] {
        match self {
            Self::Fixed(v) => v.row(i),
            Self::Variable(v) => v.row(i),
        }
    }
}

#[cfg(test)]
#[path = "vector_view_tests.rs"]
mod tests;
