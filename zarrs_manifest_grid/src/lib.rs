//! Chunk grid geometry for the [`zarrs_manifest`](https://docs.rs/zarrs_manifest/latest/zarrs_manifest/index.html) crate.
//!
//! A chunk manifest addresses its entries by chunk grid indices.
//! This crate provides:
//!  - [`ArraySubset`]: a rectangular region of an array or chunk grid,
//!  - [`iterators::Indices`]: a restartable row-major iterator over the indices of a region, and
//!  - [`RegularChunkGrid`]: the relationship between an array shape, a regular chunk shape, and the chunk grid shape.
//!
//! ## Licence
//! `zarrs_manifest_grid` is licensed under either of
//!  - the Apache License, Version 2.0 [LICENSE-APACHE](https://docs.rs/crate/zarrs_manifest_grid/latest/source/LICENCE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license [LICENSE-MIT](https://docs.rs/crate/zarrs_manifest_grid/latest/source/LICENCE-MIT) or <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.

mod array_subset;
pub use array_subset::ArraySubset;

mod regular;
pub use regular::{grid_shape, RegularChunkGrid, RegularChunkGridCreateError};

pub mod iterators;

use std::num::NonZeroU64;

/// An ND index to an element in an array or chunk.
pub type ArrayIndices = Vec<u64>;

/// An ND index to an element in an array or chunk.
/// Uses [`TinyVec`](tinyvec::TinyVec) for stack allocation up to 4 dimensions.
pub type ArrayIndicesTinyVec = tinyvec::TinyVec<[u64; 4]>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// The shape of a chunk. All dimensions must be non-zero.
pub type ChunkShape = Vec<NonZeroU64>;

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }

    /// The dimensionality that was provided.
    #[must_use]
    pub const fn got(&self) -> usize {
        self.0
    }

    /// The dimensionality that was expected.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.1
    }
}

/// Ravel ND indices to a linearised (row-major) index.
///
/// Returns [`None`] if the dimensionality of `indices` and `shape` differ or any `indices` are out-of-bounds of `shape`.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> Option<u64> {
    if indices.len() != shape.len() {
        return None;
    }
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        if i >= s {
            return None;
        }
        index += i * count;
        count *= s;
    }
    Some(index)
}

/// Unravel a linearised (row-major) index to ND indices.
///
/// Returns [`None`] if `index` is out-of-bounds of `shape`.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &[u64]) -> Option<ArrayIndicesTinyVec> {
    let total_size: u64 = shape
        .iter()
        .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))?;
    if index >= total_size {
        return None;
    }
    let mut indices = ArrayIndicesTinyVec::with_capacity(shape.len());
    indices.resize(shape.len(), 0);
    for (out, &dim) in std::iter::zip(indices.iter_mut(), shape).rev() {
        *out = index % dim;
        index /= dim;
    }
    Some(indices)
}
