//! Chunk manifests.
//!
//! A [`ChunkManifest`] is a dense grid of [`ChunkEntry`]-or-absent cells addressed by chunk grid coordinates.
//! Cells are stored in row-major order, so combining manifests is a matter of re-addressing entries.

use zarrs_manifest_grid::iterators::IndicesIntoIterator;
use zarrs_manifest_grid::{
    ravel_indices, unravel_index, ArrayIndicesTinyVec, ArrayShape, ArraySubset,
};
use zarrs_manifest_metadata::{decode_chunk_key, ChunkKeySeparator};

use crate::{ChunkEntry, ShapeError};

/// A dense N-dimensional grid of chunk entries.
///
/// Every coordinate in `0..grid_shape[i]` along each dimension `i` holds either a [`ChunkEntry`] or is absent.
/// A reader returns the fill value for an absent chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkManifest {
    grid_shape: ArrayShape,
    entries: Vec<Option<ChunkEntry>>,
}

fn num_cells(grid_shape: &[u64]) -> Result<usize, ShapeError> {
    grid_shape
        .iter()
        .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
        .and_then(|cells| usize::try_from(cells).ok())
        .ok_or_else(|| ShapeError::TooLarge(grid_shape.to_vec()))
}

impl ChunkManifest {
    /// Create a chunk manifest from a dense mapping of chunk coordinates to entries.
    ///
    /// Every coordinate of the grid must be given exactly once, with [`None`] marking an absent chunk.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if a coordinate has the wrong dimensionality, is out of bounds, is duplicated, or is missing.
    pub fn new(
        grid_shape: ArrayShape,
        entries: impl IntoIterator<Item = (Vec<u64>, Option<ChunkEntry>)>,
    ) -> Result<Self, ShapeError> {
        let slots = Self::fill_slots(&grid_shape, entries)?;
        let entries = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| ShapeError::Missing {
                    coordinate: unravel_index(index as u64, &grid_shape)
                        .map(|indices| indices.to_vec())
                        .unwrap_or_default(),
                    grid_shape: grid_shape.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            grid_shape,
            entries,
        })
    }

    /// Create a chunk manifest from the present chunks only. All other chunks are absent.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if a coordinate has the wrong dimensionality, is out of bounds, or is duplicated.
    pub fn from_present(
        grid_shape: ArrayShape,
        entries: impl IntoIterator<Item = (Vec<u64>, ChunkEntry)>,
    ) -> Result<Self, ShapeError> {
        let slots = Self::fill_slots(
            &grid_shape,
            entries
                .into_iter()
                .map(|(coordinate, entry)| (coordinate, Some(entry))),
        )?;
        Ok(Self {
            grid_shape,
            entries: slots.into_iter().map(Option::flatten).collect(),
        })
    }

    /// Create a chunk manifest from chunk keys (e.g. `"0.2.1"`) of the present chunks. All other chunks are absent.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if a chunk key is malformed, has a negative component, is out of bounds, or is duplicated.
    pub fn from_keys<K: AsRef<str>>(
        grid_shape: ArrayShape,
        separator: ChunkKeySeparator,
        entries: impl IntoIterator<Item = (K, ChunkEntry)>,
    ) -> Result<Self, ShapeError> {
        let dimensionality = grid_shape.len();
        let entries = entries
            .into_iter()
            .map(|(key, entry)| {
                Ok((
                    decode_chunk_key(key.as_ref(), separator, dimensionality)?,
                    entry,
                ))
            })
            .collect::<Result<Vec<_>, ShapeError>>()?;
        Self::from_present(grid_shape, entries)
    }

    /// Create a chunk manifest where every chunk is absent.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if the grid is too large to address.
    pub fn new_absent(grid_shape: ArrayShape) -> Result<Self, ShapeError> {
        let cells = num_cells(&grid_shape)?;
        Ok(Self {
            grid_shape,
            entries: vec![None; cells],
        })
    }

    /// Create a chunk manifest from row-major `entries`.
    pub(crate) fn from_row_major(grid_shape: ArrayShape, entries: Vec<Option<ChunkEntry>>) -> Self {
        debug_assert_eq!(
            Some(entries.len() as u64),
            grid_shape
                .iter()
                .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
        );
        Self {
            grid_shape,
            entries,
        }
    }

    fn fill_slots(
        grid_shape: &[u64],
        entries: impl IntoIterator<Item = (Vec<u64>, Option<ChunkEntry>)>,
    ) -> Result<Vec<Option<Option<ChunkEntry>>>, ShapeError> {
        let mut slots = vec![None; num_cells(grid_shape)?];
        for (coordinate, entry) in entries {
            if coordinate.len() != grid_shape.len() {
                return Err(ShapeError::IncompatibleDimensionality {
                    coordinate,
                    expected: grid_shape.len(),
                });
            }
            let Some(index) = ravel_indices(&coordinate, grid_shape) else {
                return Err(ShapeError::OutOfBounds {
                    coordinate,
                    grid_shape: grid_shape.to_vec(),
                });
            };
            #[allow(clippy::cast_possible_truncation)]
            let slot = &mut slots[index as usize];
            if slot.is_some() {
                return Err(ShapeError::Duplicate(coordinate));
            }
            *slot = Some(entry);
        }
        Ok(slots)
    }

    /// Return the number of chunks along each dimension.
    #[must_use]
    pub fn grid_shape(&self) -> &[u64] {
        &self.grid_shape
    }

    /// Return the dimensionality of the chunk grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.grid_shape.len()
    }

    /// Return the number of cells (present or absent) in the chunk grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the chunk grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the number of present chunks.
    #[must_use]
    pub fn num_present(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Return the entry at `coordinate`, or [`None`] if the chunk is absent.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if `coordinate` has the wrong dimensionality or is out of bounds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get(&self, coordinate: &[u64]) -> Result<Option<&ChunkEntry>, ShapeError> {
        if coordinate.len() != self.dimensionality() {
            return Err(ShapeError::IncompatibleDimensionality {
                coordinate: coordinate.to_vec(),
                expected: self.dimensionality(),
            });
        }
        let index = ravel_indices(coordinate, &self.grid_shape).ok_or_else(|| {
            ShapeError::OutOfBounds {
                coordinate: coordinate.to_vec(),
                grid_shape: self.grid_shape.clone(),
            }
        })?;
        Ok(self.entries[index as usize].as_ref())
    }

    /// Return the entries in row-major order.
    #[must_use]
    pub fn entries(&self) -> &[Option<ChunkEntry>] {
        &self.entries
    }

    /// Return an iterator over `(coordinate, entry)` pairs in row-major order.
    ///
    /// Absent chunks are included with a [`None`] entry.
    /// Each call starts from the first chunk.
    #[must_use]
    pub fn iter(&self) -> ChunkManifestIter<'_> {
        ChunkManifestIter {
            indices: ArraySubset::new_with_shape(self.grid_shape.clone())
                .indices()
                .into_iter(),
            entries: self.entries.iter(),
        }
    }

    /// Return an iterator over the present chunks in row-major order.
    pub fn present(&self) -> impl Iterator<Item = (ArrayIndicesTinyVec, &ChunkEntry)> {
        self.iter()
            .filter_map(|(coordinate, entry)| entry.map(|entry| (coordinate, entry)))
    }

    /// Return the sub-manifest covering the chunks in `chunks`.
    ///
    /// # Errors
    /// Returns a [`ShapeError`] if `chunks` is not within the chunk grid.
    pub fn subset(&self, chunks: &ArraySubset) -> Result<Self, ShapeError> {
        if !chunks.inbounds_shape(&self.grid_shape) {
            return Err(ShapeError::OutOfBounds {
                coordinate: chunks.end_exc(),
                grid_shape: self.grid_shape.clone(),
            });
        }
        let entries = chunks
            .indices()
            .into_iter()
            .map(|coordinate| self.get(&coordinate).map(Option::<&ChunkEntry>::cloned))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_row_major(chunks.shape().to_vec(), entries))
    }

    /// Return a copy of the manifest with every source path replaced by `rename(path)`.
    #[must_use]
    pub fn rename_paths(&self, rename: impl Fn(&str) -> String) -> Self {
        Self {
            grid_shape: self.grid_shape.clone(),
            entries: self
                .entries
                .iter()
                .map(|entry| {
                    entry
                        .as_ref()
                        .map(|entry| entry.with_renamed_path(&rename))
                })
                .collect(),
        }
    }

    /// Return the total byte length of all present chunks.
    #[must_use]
    pub fn referenced_bytes(&self) -> u64 {
        self.entries.iter().flatten().map(ChunkEntry::length).sum()
    }

    /// Return the manifest with a new axis of length 1 inserted at `axis`.
    ///
    /// The row-major order of entries is unchanged.
    pub(crate) fn insert_axis(&self, axis: usize) -> Self {
        let mut grid_shape = self.grid_shape.clone();
        grid_shape.insert(axis, 1);
        Self::from_row_major(grid_shape, self.entries.clone())
    }

    /// Return the manifest with the length 1 axis at `axis` removed.
    pub(crate) fn remove_axis(&self, axis: usize) -> Self {
        debug_assert_eq!(self.grid_shape[axis], 1);
        let mut grid_shape = self.grid_shape.clone();
        grid_shape.remove(axis);
        Self::from_row_major(grid_shape, self.entries.clone())
    }

    /// Concatenate manifests of equal dimensionality along `axis`.
    ///
    /// All grid dimensions other than `axis` must match.
    pub(crate) fn concatenate(manifests: &[&Self], axis: usize) -> Self {
        let Some(first) = manifests.first() else {
            return Self::from_row_major(vec![0], Vec::new());
        };
        let mut grid_shape = first.grid_shape.clone();
        grid_shape[axis] = manifests.iter().map(|m| m.grid_shape[axis]).sum();
        #[allow(clippy::cast_possible_truncation)]
        let outer = grid_shape[..axis].iter().product::<u64>() as usize;
        let mut entries = Vec::with_capacity(manifests.iter().map(|m| m.len()).sum());
        for o in 0..outer {
            for manifest in manifests {
                // each input contributes a contiguous block per outer index
                let block = manifest.len() / outer;
                entries.extend_from_slice(&manifest.entries[o * block..(o + 1) * block]);
            }
        }
        Self::from_row_major(grid_shape, entries)
    }

    /// Return the manifest broadcast to `grid_shape`.
    ///
    /// New leading axes repeat the whole grid.
    /// Existing axes of length 1 repeat their entries along the target length.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn broadcast(&self, grid_shape: ArrayShape) -> Self {
        let offset = grid_shape.len() - self.dimensionality();
        let entries = ArraySubset::new_with_shape(grid_shape.clone())
            .indices()
            .into_iter()
            .map(|target| {
                let source: Vec<u64> = std::iter::zip(&target[offset..], &self.grid_shape)
                    .map(|(&index, &size)| if size == 1 { 0 } else { index })
                    .collect();
                ravel_indices(&source, &self.grid_shape)
                    .and_then(|index| self.entries[index as usize].clone())
            })
            .collect();
        Self::from_row_major(grid_shape, entries)
    }
}

impl<'a> IntoIterator for &'a ChunkManifest {
    type Item = (ArrayIndicesTinyVec, Option<&'a ChunkEntry>);
    type IntoIter = ChunkManifestIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A row-major iterator over the cells of a [`ChunkManifest`].
///
/// See [`ChunkManifest::iter`].
pub struct ChunkManifestIter<'a> {
    indices: IndicesIntoIterator,
    entries: std::slice::Iter<'a, Option<ChunkEntry>>,
}

impl<'a> Iterator for ChunkManifestIter<'a> {
    type Item = (ArrayIndicesTinyVec, Option<&'a ChunkEntry>);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.indices.next()?, self.entries.next()?.as_ref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for ChunkManifestIter<'_> {}

impl std::iter::FusedIterator for ChunkManifestIter<'_> {}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    fn entry(i: u64) -> ChunkEntry {
        ChunkEntry::new("file.nc", i * 100, 100)
    }

    #[test]
    fn chunk_manifest_new() {
        let manifest = ChunkManifest::new(
            vec![2, 2],
            vec![
                (vec![1, 1], Some(entry(3))),
                (vec![0, 0], Some(entry(0))),
                (vec![0, 1], None),
                (vec![1, 0], Some(entry(2))),
            ],
        )
        .unwrap();
        assert_eq!(manifest.grid_shape(), &[2, 2]);
        assert_eq!(manifest.len(), 4);
        assert_eq!(manifest.num_present(), 3);
        assert_eq!(manifest.get(&[1, 1]).unwrap(), Some(&entry(3)));
        assert_eq!(manifest.get(&[0, 1]).unwrap(), None);
        assert!(manifest.get(&[2, 0]).is_err());
        assert!(manifest.get(&[0]).is_err());
        assert_eq!(manifest.referenced_bytes(), 300);
    }

    #[test]
    fn chunk_manifest_missing_coordinate() {
        let result = ChunkManifest::new(
            vec![3],
            vec![(vec![0], Some(entry(0))), (vec![2], Some(entry(2)))],
        );
        assert_eq!(
            result,
            Err(ShapeError::Missing {
                coordinate: vec![1],
                grid_shape: vec![3],
            })
        );
        assert!(ChunkManifest::new(
            vec![3],
            vec![
                (vec![0], Some(entry(0))),
                (vec![1], None),
                (vec![2], Some(entry(2)))
            ],
        )
        .is_ok());
    }

    #[test]
    fn chunk_manifest_invalid_coordinates() {
        assert!(matches!(
            ChunkManifest::from_present(vec![2], vec![(vec![2], entry(0))]),
            Err(ShapeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            ChunkManifest::from_present(vec![2], vec![(vec![0, 0], entry(0))]),
            Err(ShapeError::IncompatibleDimensionality { expected: 1, .. })
        ));
        assert_eq!(
            ChunkManifest::from_present(vec![2], vec![(vec![1], entry(0)), (vec![1], entry(1))]),
            Err(ShapeError::Duplicate(vec![1]))
        );
        assert!(matches!(
            ChunkManifest::from_keys(vec![2], ChunkKeySeparator::Dot, vec![("-1", entry(0))]),
            Err(ShapeError::InvalidChunkKey(_))
        ));
        assert!(matches!(
            ChunkManifest::new_absent(vec![u64::MAX, u64::MAX]),
            Err(ShapeError::TooLarge(_))
        ));
    }

    #[test]
    fn chunk_manifest_from_keys() {
        let manifest = ChunkManifest::from_keys(
            vec![1, 3],
            ChunkKeySeparator::Dot,
            vec![("0.2", entry(2)), ("0.0", entry(0))],
        )
        .unwrap();
        assert_eq!(manifest.num_present(), 2);
        assert_eq!(manifest.get(&[0, 1]).unwrap(), None);
        assert_eq!(manifest.get(&[0, 2]).unwrap(), Some(&entry(2)));
    }

    #[test]
    fn chunk_manifest_iter_row_major() {
        let manifest = ChunkManifest::from_present(
            vec![2, 3],
            (0..6).map(|i| (vec![i / 3, i % 3], entry(i))),
        )
        .unwrap();
        let coordinates = manifest
            .iter()
            .map(|(coordinate, _)| coordinate.to_vec())
            .collect_vec();
        assert_eq!(
            coordinates,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
        let offsets = manifest
            .iter()
            .map(|(_, entry)| entry.unwrap().offset())
            .collect_vec();
        assert_eq!(offsets, vec![0, 100, 200, 300, 400, 500]);
        // restartable
        assert_eq!(manifest.iter().count(), 6);
        assert_eq!(manifest.iter().len(), 6);
    }

    #[test]
    fn chunk_manifest_scalar_and_empty() {
        let scalar = ChunkManifest::from_present(vec![], vec![(vec![], entry(0))]).unwrap();
        assert_eq!(scalar.len(), 1);
        assert_eq!(scalar.get(&[]).unwrap(), Some(&entry(0)));
        assert_eq!(scalar.iter().count(), 1);

        let empty = ChunkManifest::new(vec![0, 4], std::iter::empty()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.iter().count(), 0);
    }

    #[test]
    fn chunk_manifest_subset() {
        let manifest = ChunkManifest::from_present(
            vec![2, 3],
            (0..6).map(|i| (vec![i / 3, i % 3], entry(i))),
        )
        .unwrap();
        let subset = manifest
            .subset(&ArraySubset::new_with_ranges(&[1..2, 1..3]))
            .unwrap();
        assert_eq!(subset.grid_shape(), &[1, 2]);
        assert_eq!(subset.get(&[0, 0]).unwrap(), Some(&entry(4)));
        assert_eq!(subset.get(&[0, 1]).unwrap(), Some(&entry(5)));
        assert!(manifest
            .subset(&ArraySubset::new_with_ranges(&[1..3, 0..1]))
            .is_err());
    }

    #[test]
    fn chunk_manifest_concatenate() {
        let a = ChunkManifest::from_present(
            vec![2, 1],
            vec![(vec![0, 0], entry(0)), (vec![1, 0], entry(1))],
        )
        .unwrap();
        let b = ChunkManifest::from_present(
            vec![2, 2],
            vec![(vec![0, 1], entry(10)), (vec![1, 0], entry(11))],
        )
        .unwrap();
        let c = ChunkManifest::concatenate(&[&a, &b], 1);
        assert_eq!(c.grid_shape(), &[2, 3]);
        assert_eq!(
            c.entries().to_vec(),
            vec![
                Some(entry(0)),
                None,
                Some(entry(10)),
                Some(entry(1)),
                Some(entry(11)),
                None
            ]
        );
    }

    #[test]
    fn chunk_manifest_broadcast() {
        let a = ChunkManifest::from_present(vec![1], vec![(vec![0], entry(7))]).unwrap();
        let b = a.broadcast(vec![2, 3]);
        assert_eq!(b.grid_shape(), &[2, 3]);
        assert_eq!(b.num_present(), 6);
        assert!(b.iter().all(|(_, e)| e == Some(&entry(7))));
    }

    #[test]
    fn chunk_manifest_rename_paths() {
        let manifest = ChunkManifest::from_present(vec![2], vec![(vec![0], entry(0))]).unwrap();
        let renamed = manifest.rename_paths(|path| format!("s3://bucket/{path}"));
        assert_eq!(
            renamed.get(&[0]).unwrap().unwrap().path(),
            Some("s3://bucket/file.nc")
        );
        assert_eq!(renamed.get(&[1]).unwrap(), None);
    }
}
