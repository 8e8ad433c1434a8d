//! The `regular` chunk grid.
//!
//! A regular grid tiles an array with chunks of a fixed shape.
//! The final chunk along an axis may extend past the array extent, in which case only part of it is logically within the array.

use std::num::NonZeroU64;
use std::ops::Range;

use thiserror::Error;

use crate::{ArrayShape, ArraySubset, ChunkShape};

/// A [`RegularChunkGrid`] creation error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("regular chunk shape {1:?} not compatible with array shape {0:?}")]
pub struct RegularChunkGridCreateError(ArrayShape, ChunkShape);

/// A `regular` chunk grid.
#[allow(clippy::struct_field_names)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularChunkGrid {
    array_shape: ArrayShape,
    grid_shape: ArrayShape,
    chunk_shape: ChunkShape,
}

impl RegularChunkGrid {
    /// Create a new `regular` chunk grid with chunk shape `chunk_shape`.
    ///
    /// # Errors
    /// Returns a [`RegularChunkGridCreateError`] if `chunk_shape` and `array_shape` differ in dimensionality.
    pub fn new(
        array_shape: ArrayShape,
        chunk_shape: ChunkShape,
    ) -> Result<Self, RegularChunkGridCreateError> {
        if array_shape.len() != chunk_shape.len() {
            return Err(RegularChunkGridCreateError(array_shape, chunk_shape));
        }
        let grid_shape = grid_shape(&array_shape, &chunk_shape);
        Ok(Self {
            array_shape,
            grid_shape,
            chunk_shape,
        })
    }

    /// Return the array shape.
    #[must_use]
    pub fn array_shape(&self) -> &[u64] {
        &self.array_shape
    }

    /// Return the grid shape (i.e. number of chunks along each axis).
    #[must_use]
    pub fn grid_shape(&self) -> &[u64] {
        &self.grid_shape
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[NonZeroU64] {
        &self.chunk_shape
    }

    /// Return the chunk shape as an [`ArrayShape`] ([`Vec<u64>`]).
    #[must_use]
    pub fn chunk_shape_u64(&self) -> ArrayShape {
        self.chunk_shape.iter().map(|s| s.get()).collect()
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.array_shape.len()
    }

    /// Returns true if every chunk along `axis` is full (i.e. the array extent is a multiple of the chunk size).
    ///
    /// # Panics
    /// Panics if `axis` is out of bounds.
    #[must_use]
    pub fn is_full_along(&self, axis: usize) -> bool {
        self.array_shape[axis] % self.chunk_shape[axis].get() == 0
    }

    /// Map element `ranges` onto the chunks they cover, if every range boundary is chunk aligned.
    ///
    /// A start is aligned if it is a multiple of the chunk size.
    /// An end is aligned if it is a multiple of the chunk size or equal to the array extent.
    ///
    /// # Errors
    /// Returns the axis of the first misaligned or out-of-bounds range.
    pub fn chunks_of_aligned_ranges(&self, ranges: &[Range<u64>]) -> Result<ArraySubset, usize> {
        if ranges.len() != self.dimensionality() {
            return Err(0);
        }
        let mut chunk_ranges = Vec::with_capacity(ranges.len());
        for (axis, range) in ranges.iter().enumerate() {
            let chunk = self.chunk_shape[axis].get();
            let extent = self.array_shape[axis];
            let start_aligned = range.start % chunk == 0;
            let end_aligned = range.end % chunk == 0 || range.end == extent;
            if range.start > range.end || range.end > extent || !start_aligned || !end_aligned {
                return Err(axis);
            }
            chunk_ranges.push(range.start / chunk..range.end.div_ceil(chunk));
        }
        Ok(ArraySubset::new_with_ranges(&chunk_ranges))
    }
}

/// Compute the regular grid shape of an array: `ceil(array_shape / chunk_shape)` per dimension.
///
/// The dimensionality of the result is the shorter of the two inputs.
#[must_use]
pub fn grid_shape(array_shape: &[u64], chunk_shape: &[NonZeroU64]) -> ArrayShape {
    std::iter::zip(array_shape, chunk_shape)
        .map(|(a, s)| a.div_ceil(s.get()))
        .collect()
}
