use std::num::NonZeroU64;
use std::ops::Range;

use zarrs_manifest_grid::{
    ArrayShape, IncompatibleDimensionalityError, RegularChunkGrid,
};

use crate::{
    AlignmentError, ArrayEncoding, ChunkManifest, ElementwiseOperation, GeometryError,
    ReshapeError, UnsupportedOperationError,
};

/// A virtual array.
///
/// A [`ManifestArray`] is described entirely by its shape, its [`ArrayEncoding`], and a [`ChunkManifest`] locating every chunk.
/// Operations on a [`ManifestArray`] never read chunk data: they only re-address manifest entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestArray {
    chunk_grid: RegularChunkGrid,
    encoding: ArrayEncoding,
    manifest: ChunkManifest,
}

impl ManifestArray {
    /// Create a new manifest array.
    ///
    /// # Errors
    /// Returns a [`GeometryError`] if the chunk grid of `manifest` does not tile `shape` with the chunk shape of `encoding`.
    pub fn new(
        shape: ArrayShape,
        encoding: ArrayEncoding,
        manifest: ChunkManifest,
    ) -> Result<Self, GeometryError> {
        let geometry_error = |shape: ArrayShape| GeometryError::GridShape {
            shape,
            chunk_shape: encoding.chunk_shape().to_vec(),
            grid_shape: manifest.grid_shape().to_vec(),
        };
        let chunk_grid = RegularChunkGrid::new(shape.clone(), encoding.chunk_shape().to_vec())
            .map_err(|_| geometry_error(shape.clone()))?;
        if chunk_grid.grid_shape() != manifest.grid_shape() {
            return Err(geometry_error(shape));
        }
        Ok(Self {
            chunk_grid,
            encoding,
            manifest,
        })
    }

    /// Return the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.chunk_grid.array_shape()
    }

    /// Return the dimensionality of the array.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.chunk_grid.dimensionality()
    }

    /// Return the encoding.
    #[must_use]
    pub fn encoding(&self) -> &ArrayEncoding {
        &self.encoding
    }

    /// Return the chunk manifest.
    #[must_use]
    pub fn manifest(&self) -> &ChunkManifest {
        &self.manifest
    }

    /// Return the regular chunk grid of the array.
    #[must_use]
    pub fn chunk_grid(&self) -> &RegularChunkGrid {
        &self.chunk_grid
    }

    /// Return the number of chunks (present or absent).
    #[must_use]
    pub fn nchunks(&self) -> usize {
        self.manifest.len()
    }

    /// Return the total byte length of all present chunks.
    #[must_use]
    pub fn referenced_bytes(&self) -> u64 {
        self.manifest.referenced_bytes()
    }

    /// Return a copy of the array with every source path replaced by `rename(path)`.
    #[must_use]
    pub fn rename_paths(&self, rename: impl Fn(&str) -> String) -> Self {
        Self {
            chunk_grid: self.chunk_grid.clone(),
            encoding: self.encoding.clone(),
            manifest: self.manifest.rename_paths(rename),
        }
    }

    /// Select a chunk aligned region of the array.
    ///
    /// Each range is in element coordinates.
    /// A range must start on a chunk boundary and end on a chunk boundary or at the array extent.
    ///
    /// # Errors
    /// Returns an [`AlignmentError`] if a range is misaligned, reversed, or out of bounds, or the number of ranges does not match the dimensionality.
    #[allow(clippy::missing_panics_doc)]
    pub fn slice(&self, ranges: &[Range<u64>]) -> Result<Self, AlignmentError> {
        if ranges.len() != self.dimensionality() {
            return Err(
                IncompatibleDimensionalityError::new(ranges.len(), self.dimensionality()).into(),
            );
        }
        let chunks = self
            .chunk_grid
            .chunks_of_aligned_ranges(ranges)
            .map_err(|axis| AlignmentError::Misaligned {
                axis,
                range: ranges[axis].clone(),
                chunk_size: self.encoding.chunk_shape()[axis].get(),
                extent: self.shape()[axis],
            })?;
        let shape = ranges.iter().map(|range| range.end - range.start).collect();
        let manifest = self
            .manifest
            .subset(&chunks)
            .expect("aligned chunk ranges are within the chunk grid");
        Ok(self.with_parts(shape, self.encoding.clone(), manifest))
    }

    /// Insert a new axis of length 1 (with chunk size 1) at `axis`.
    ///
    /// # Errors
    /// Returns a [`ReshapeError`] if `axis` is greater than the dimensionality.
    pub fn expand_dims(&self, axis: usize) -> Result<Self, ReshapeError> {
        if axis > self.dimensionality() {
            return Err(ReshapeError::InvalidAxis {
                axis,
                dimensionality: self.dimensionality(),
            });
        }
        let mut shape = self.shape().to_vec();
        shape.insert(axis, 1);
        let mut chunk_shape = self.encoding.chunk_shape().to_vec();
        chunk_shape.insert(axis, NonZeroU64::MIN);
        Ok(self.with_parts(
            shape,
            self.encoding.clone().with_chunk_shape(chunk_shape),
            self.manifest.insert_axis(axis),
        ))
    }

    /// Remove the axis `axis`, which must have length 1 and chunk size 1.
    ///
    /// # Errors
    /// Returns a [`ReshapeError`] if `axis` is out of bounds or cannot be removed without changing the layout of chunk data.
    pub fn squeeze(&self, axis: usize) -> Result<Self, ReshapeError> {
        if axis >= self.dimensionality() {
            return Err(ReshapeError::InvalidAxis {
                axis,
                dimensionality: self.dimensionality(),
            });
        }
        let size = self.shape()[axis];
        let chunk_size = self.encoding.chunk_shape()[axis].get();
        if size != 1 || chunk_size != 1 {
            return Err(ReshapeError::NotSqueezable {
                axis,
                size,
                chunk_size,
            });
        }
        let mut shape = self.shape().to_vec();
        shape.remove(axis);
        let mut chunk_shape = self.encoding.chunk_shape().to_vec();
        chunk_shape.remove(axis);
        Ok(self.with_parts(
            shape,
            self.encoding.clone().with_chunk_shape(chunk_shape),
            self.manifest.remove_axis(axis),
        ))
    }

    /// Broadcast the array to `shape`.
    ///
    /// New leading axes get chunk size 1 and repeat every chunk reference.
    /// An existing axis of length 1 can be broadcast only if its chunk size is 1.
    ///
    /// # Errors
    /// Returns a [`ReshapeError`] if the array cannot be broadcast to `shape` without reading data.
    pub fn broadcast_to(&self, shape: &[u64]) -> Result<Self, ReshapeError> {
        let incompatible = || ReshapeError::IncompatibleBroadcast {
            shape: self.shape().to_vec(),
            chunk_shape: self.encoding.chunk_shape().to_vec(),
            target: shape.to_vec(),
        };
        let Some(offset) = shape.len().checked_sub(self.dimensionality()) else {
            return Err(incompatible());
        };
        let broadcastable = itertools::izip!(
            &shape[offset..],
            self.shape(),
            self.encoding.chunk_shape()
        )
        .all(|(&target, &size, chunk_size)| {
            target == size || (size == 1 && chunk_size.get() == 1)
        });
        if !broadcastable {
            return Err(incompatible());
        }
        let chunk_shape: Vec<NonZeroU64> = std::iter::repeat_n(NonZeroU64::MIN, offset)
            .chain(self.encoding.chunk_shape().iter().copied())
            .collect();
        let grid_shape = zarrs_manifest_grid::grid_shape(shape, &chunk_shape);
        Ok(self.with_parts(
            shape.to_vec(),
            self.encoding.clone().with_chunk_shape(chunk_shape),
            self.manifest.broadcast(grid_shape),
        ))
    }

    /// Apply an elementwise operation.
    ///
    /// # Errors
    /// Always returns an [`UnsupportedOperationError`], a manifest array has no data to compute on.
    pub fn apply(&self, operation: &ElementwiseOperation) -> Result<Self, UnsupportedOperationError> {
        Err(UnsupportedOperationError::new(
            operation.to_string(),
            "manifest arrays only reference chunk data and cannot compute on it",
        ))
    }

    /// Assemble an array from parts that are consistent by construction.
    pub(crate) fn with_parts(
        &self,
        shape: ArrayShape,
        encoding: ArrayEncoding,
        manifest: ChunkManifest,
    ) -> Self {
        Self::new(shape, encoding, manifest).expect("reindexed manifest arrays are consistent")
    }
}

#[cfg(test)]
mod tests {
    use zarrs_manifest_metadata::v2::FillValueMetadataV2;

    use super::*;
    use crate::ChunkEntry;

    fn chunk_shape(shape: &[u64]) -> Vec<NonZeroU64> {
        shape.iter().map(|&s| NonZeroU64::new(s).unwrap()).collect()
    }

    fn array(shape: &[u64], chunks: &[u64]) -> ManifestArray {
        let encoding = ArrayEncoding::new(
            "<i4".into(),
            chunk_shape(chunks),
            FillValueMetadataV2::from(0i64),
        );
        let grid_shape = zarrs_manifest_grid::grid_shape(shape, &chunk_shape(chunks));
        let manifest = ChunkManifest::from_present(
            grid_shape.clone(),
            zarrs_manifest_grid::ArraySubset::new_with_shape(grid_shape)
                .indices()
                .into_iter()
                .enumerate()
                .map(|(i, indices)| {
                    (
                        indices.to_vec(),
                        ChunkEntry::new("data.h5", i as u64 * 16, 16),
                    )
                }),
        )
        .unwrap();
        ManifestArray::new(shape.to_vec(), encoding, manifest).unwrap()
    }

    #[test]
    fn manifest_array_geometry() {
        let a = array(&[5, 4], &[2, 2]);
        assert_eq!(a.shape(), &[5, 4]);
        assert_eq!(a.manifest().grid_shape(), &[3, 2]);
        assert_eq!(a.nchunks(), 6);
        assert_eq!(a.referenced_bytes(), 96);

        let encoding = a.encoding().clone();
        let manifest = a.manifest().clone();
        assert!(matches!(
            ManifestArray::new(vec![6, 4], encoding.clone(), manifest.clone()),
            Ok(_)
        ));
        assert!(matches!(
            ManifestArray::new(vec![7, 4], encoding.clone(), manifest.clone()),
            Err(GeometryError::GridShape { .. })
        ));
        assert!(matches!(
            ManifestArray::new(vec![5], encoding, manifest),
            Err(GeometryError::GridShape { .. })
        ));
    }

    #[test]
    fn manifest_array_zero_extent() {
        let a = array(&[0, 4], &[2, 2]);
        assert_eq!(a.manifest().grid_shape(), &[0, 2]);
        assert_eq!(a.nchunks(), 0);
    }

    #[test]
    fn manifest_array_slice() {
        let a = array(&[5, 4], &[2, 2]);
        let b = a.slice(&[2..5, 0..2]).unwrap();
        assert_eq!(b.shape(), &[3, 2]);
        assert_eq!(b.manifest().grid_shape(), &[2, 1]);
        assert_eq!(
            b.manifest().get(&[0, 0]).unwrap(),
            a.manifest().get(&[1, 0]).unwrap()
        );
        assert_eq!(
            b.manifest().get(&[1, 0]).unwrap(),
            a.manifest().get(&[2, 0]).unwrap()
        );
        assert_eq!(a.slice(&[0..5, 0..4]).unwrap(), a);

        assert_eq!(
            a.slice(&[1..5, 0..4]),
            Err(AlignmentError::Misaligned {
                axis: 0,
                range: 1..5,
                chunk_size: 2,
                extent: 5
            })
        );
        assert!(matches!(
            a.slice(&[0..4, 0..3]),
            Err(AlignmentError::Misaligned { axis: 1, .. })
        ));
        assert!(matches!(
            a.slice(&[0..6, 0..4]),
            Err(AlignmentError::Misaligned { axis: 0, .. })
        ));
        assert!(matches!(
            a.slice(&[0..4]),
            Err(AlignmentError::IncompatibleDimensionality(_))
        ));
    }

    #[test]
    fn manifest_array_expand_squeeze() {
        let a = array(&[4], &[2]);
        let b = a.expand_dims(0).unwrap();
        assert_eq!(b.shape(), &[1, 4]);
        assert_eq!(b.encoding().chunk_shape_u64(), vec![1, 2]);
        assert_eq!(b.manifest().grid_shape(), &[1, 2]);
        assert_eq!(b.squeeze(0).unwrap(), a);
        assert!(a.expand_dims(2).is_err());
        assert!(matches!(
            a.squeeze(0),
            Err(ReshapeError::NotSqueezable { .. })
        ));
        assert!(matches!(
            a.squeeze(1),
            Err(ReshapeError::InvalidAxis { .. })
        ));

        let c = a.expand_dims(1).unwrap();
        assert_eq!(c.shape(), &[4, 1]);
        assert_eq!(c.squeeze(1).unwrap(), a);
    }

    #[test]
    fn manifest_array_broadcast() {
        let a = array(&[1, 4], &[1, 2]);
        let b = a.broadcast_to(&[3, 2, 4]).unwrap();
        assert_eq!(b.shape(), &[3, 2, 4]);
        assert_eq!(b.encoding().chunk_shape_u64(), vec![1, 1, 2]);
        assert_eq!(b.manifest().grid_shape(), &[3, 2, 2]);
        assert_eq!(
            b.manifest().get(&[2, 1, 1]).unwrap(),
            a.manifest().get(&[0, 1]).unwrap()
        );
        assert_eq!(a.broadcast_to(&[1, 4]).unwrap(), a);

        assert!(a.broadcast_to(&[4]).is_err());
        assert!(a.broadcast_to(&[2, 5]).is_err());
        // a length 1 axis with a larger chunk cannot be repeated
        let c = array(&[1, 4], &[2, 2]);
        assert!(matches!(
            c.broadcast_to(&[2, 4]),
            Err(ReshapeError::IncompatibleBroadcast { .. })
        ));
    }

    #[test]
    fn manifest_array_elementwise_unsupported() {
        let a = array(&[4], &[2]);
        for operation in [
            ElementwiseOperation::Add,
            ElementwiseOperation::Compare,
            ElementwiseOperation::Reduce,
            ElementwiseOperation::Cast("<f8".into()),
        ] {
            assert!(a.apply(&operation).is_err());
        }
    }

    #[test]
    fn manifest_array_rename_paths() {
        let a = array(&[4], &[2]).rename_paths(|path| format!("/mnt/{path}"));
        assert!(a
            .manifest()
            .present()
            .all(|(_, entry)| entry.path() == Some("/mnt/data.h5")));
    }
}
