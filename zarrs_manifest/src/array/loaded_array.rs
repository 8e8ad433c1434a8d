use std::num::NonZeroU64;

use bytes::{Bytes, BytesMut};
use zarrs_manifest_grid::ArrayShape;
use zarrs_manifest_metadata::v2::{ArrayMetadataV2DataType, FillValueMetadataV2};

use crate::combine::check_sizes;
use crate::{
    ArrayEncoding, ChunkEntry, ChunkManifest, EncodingField, GeometryError,
    IncompatibleEncodingError, ManifestArray, ManifestError, ReshapeError,
};

/// A small array held in memory.
///
/// Readers may load some variables eagerly (typically coordinate variables) instead of referencing their chunks.
/// The elements are stored as raw bytes in C (row-major) order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedArray {
    shape: ArrayShape,
    data_type: ArrayMetadataV2DataType,
    fill_value: FillValueMetadataV2,
    data: Bytes,
}

impl LoadedArray {
    /// Create a new loaded array.
    ///
    /// # Errors
    /// Returns [`GeometryError::DataSize`] if the data type is not fixed size or `data` does not hold exactly the elements of `shape`.
    pub fn new(
        shape: ArrayShape,
        data_type: ArrayMetadataV2DataType,
        fill_value: FillValueMetadataV2,
        data: impl Into<Bytes>,
    ) -> Result<Self, GeometryError> {
        let data = data.into();
        let expected = data_type.size().and_then(|size| {
            shape
                .iter()
                .try_fold(size, |acc, &dim| acc.checked_mul(dim))
        });
        if expected != Some(data.len() as u64) {
            return Err(GeometryError::DataSize {
                shape,
                data_type,
                got: data.len(),
            });
        }
        Ok(Self {
            shape,
            data_type,
            fill_value,
            data,
        })
    }

    /// Return the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    /// Return the data type.
    #[must_use]
    pub fn data_type(&self) -> &ArrayMetadataV2DataType {
        &self.data_type
    }

    /// Return the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValueMetadataV2 {
        &self.fill_value
    }

    /// Return the element bytes in C order.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Convert to a [`ManifestArray`] with a single uncompressed chunk held inline.
    ///
    /// A zero-length dimension gets chunk size 1 and the manifest has no chunks.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn to_manifest_array(&self) -> ManifestArray {
        let chunk_shape: Vec<NonZeroU64> = self
            .shape
            .iter()
            .map(|&size| NonZeroU64::new(size).unwrap_or(NonZeroU64::MIN))
            .collect();
        let grid_shape = zarrs_manifest_grid::grid_shape(&self.shape, &chunk_shape);
        let entries = if grid_shape.contains(&0) {
            Vec::new()
        } else {
            vec![Some(ChunkEntry::new_inline(self.data.clone()))]
        };
        let encoding = ArrayEncoding::new(
            self.data_type.clone(),
            chunk_shape,
            self.fill_value.clone(),
        );
        ManifestArray::new(
            self.shape.clone(),
            encoding,
            ChunkManifest::from_row_major(grid_shape, entries),
        )
        .expect("a single chunk covers the array")
    }

    /// Convert a [`ManifestArray`] laid out by [`to_manifest_array`](Self::to_manifest_array) back to a loaded array.
    ///
    /// Returns [`None`] unless `array` is a single uncompressed inline chunk covering the whole array.
    #[must_use]
    pub fn from_manifest_array(array: &ManifestArray) -> Option<Self> {
        let data = match array.manifest().entries() {
            [] => Bytes::new(),
            [Some(entry)] => entry.inline_data()?.clone(),
            _ => return None,
        };
        let encoding = array.encoding();
        let loaded = Self::new(
            array.shape().to_vec(),
            encoding.data_type().clone(),
            encoding.fill_value().clone(),
            data,
        )
        .ok()?;
        (loaded.to_manifest_array() == *array).then_some(loaded)
    }

    /// Insert a new axis of length 1 at `axis`.
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
        let mut loaded = self.clone();
        loaded.shape.insert(axis, 1);
        Ok(loaded)
    }

    /// Remove the length 1 axis `axis`.
    ///
    /// # Errors
    /// Returns a [`ReshapeError`] if `axis` is out of bounds or does not have length 1.
    pub fn squeeze(&self, axis: usize) -> Result<Self, ReshapeError> {
        let Some(&size) = self.shape.get(axis) else {
            return Err(ReshapeError::InvalidAxis {
                axis,
                dimensionality: self.dimensionality(),
            });
        };
        if size != 1 {
            return Err(ReshapeError::NotSqueezable {
                axis,
                size,
                chunk_size: size,
            });
        }
        let mut loaded = self.clone();
        loaded.shape.remove(axis);
        Ok(loaded)
    }

    /// Concatenate loaded arrays along `axis` in memory.
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if `arrays` is empty, `axis` is out of bounds, or the arrays differ in data type, fill value, dimensionality, or size on another axis.
    pub fn concatenate(arrays: &[&Self], axis: usize) -> Result<Self, ManifestError> {
        let Some(first) = arrays.first() else {
            return Err(ManifestError::EmptyInput);
        };
        if axis >= first.dimensionality() {
            return Err(ReshapeError::InvalidAxis {
                axis,
                dimensionality: first.dimensionality(),
            }
            .into());
        }
        for (input, array) in arrays.iter().enumerate().skip(1) {
            if array.data_type != first.data_type {
                return Err(IncompatibleEncodingError::new(
                    0,
                    input,
                    EncodingField::DataType,
                    first.data_type.to_string(),
                    array.data_type.to_string(),
                )
                .into());
            }
            if array.fill_value != first.fill_value {
                return Err(IncompatibleEncodingError::new(
                    0,
                    input,
                    EncodingField::FillValue,
                    first.fill_value.to_string(),
                    array.fill_value.to_string(),
                )
                .into());
            }
            check_sizes(&first.shape, &array.shape, input, axis)?;
        }

        let mut shape = first.shape.clone();
        shape[axis] = arrays.iter().map(|array| array.shape[axis]).sum();
        #[allow(clippy::cast_possible_truncation)]
        let outer = first.shape[..axis].iter().product::<u64>() as usize;
        let mut data = BytesMut::with_capacity(arrays.iter().map(|array| array.data.len()).sum());
        for o in 0..outer {
            for array in arrays {
                let block = array.data.len() / outer;
                data.extend_from_slice(&array.data[o * block..(o + 1) * block]);
            }
        }
        log::debug!(
            "concatenated {} loaded arrays along axis {axis} to shape {shape:?}",
            arrays.len()
        );
        Ok(Self {
            shape,
            data_type: first.data_type.clone(),
            fill_value: first.fill_value.clone(),
            data: data.freeze(),
        })
    }
}
