use derive_more::From;
use zarrs_manifest_metadata::v2::{ArrayMetadataV2DataType, FillValueMetadataV2};

use crate::{LoadedArray, ManifestArray, ManifestError, ReshapeError, UnsupportedOperationError};

/// The array of a dataset variable.
#[derive(Clone, Debug, PartialEq, Eq, From)]
pub enum VirtualArray {
    /// An array of chunk references.
    Manifest(ManifestArray),
    /// An array held in memory.
    Loaded(LoadedArray),
}

impl VirtualArray {
    /// Return the array shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        match self {
            Self::Manifest(array) => array.shape(),
            Self::Loaded(array) => array.shape(),
        }
    }

    /// Return the dimensionality of the array.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.shape().len()
    }

    /// Return the data type.
    #[must_use]
    pub fn data_type(&self) -> &ArrayMetadataV2DataType {
        match self {
            Self::Manifest(array) => array.encoding().data_type(),
            Self::Loaded(array) => array.data_type(),
        }
    }

    /// Return the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValueMetadataV2 {
        match self {
            Self::Manifest(array) => array.encoding().fill_value(),
            Self::Loaded(array) => array.fill_value(),
        }
    }

    /// Return the manifest array, or [`None`] if the array is loaded.
    #[must_use]
    pub fn as_manifest(&self) -> Option<&ManifestArray> {
        match self {
            Self::Manifest(array) => Some(array),
            Self::Loaded(_) => None,
        }
    }

    /// Return the loaded array, or [`None`] if the array is a manifest array.
    #[must_use]
    pub fn as_loaded(&self) -> Option<&LoadedArray> {
        match self {
            Self::Manifest(_) => None,
            Self::Loaded(array) => Some(array),
        }
    }

    /// Insert a new axis of length 1 at `axis`.
    ///
    /// # Errors
    /// Returns a [`ReshapeError`] if `axis` is greater than the dimensionality.
    pub fn expand_dims(&self, axis: usize) -> Result<Self, ReshapeError> {
        Ok(match self {
            Self::Manifest(array) => Self::Manifest(array.expand_dims(axis)?),
            Self::Loaded(array) => Self::Loaded(array.expand_dims(axis)?),
        })
    }

    /// Remove the length 1 axis `axis`.
    ///
    /// # Errors
    /// Returns a [`ReshapeError`] if `axis` cannot be removed.
    pub fn squeeze(&self, axis: usize) -> Result<Self, ReshapeError> {
        Ok(match self {
            Self::Manifest(array) => Self::Manifest(array.squeeze(axis)?),
            Self::Loaded(array) => Self::Loaded(array.squeeze(axis)?),
        })
    }

    /// Concatenate arrays along `axis`.
    ///
    /// Manifest arrays are combined with [`concatenate`](crate::concatenate) and loaded arrays with [`LoadedArray::concatenate`].
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if the arrays cannot be concatenated, including [`UnsupportedOperationError`] if manifest and loaded arrays are mixed.
    pub fn concatenate(arrays: &[Self], axis: usize) -> Result<Self, ManifestError> {
        match arrays.first() {
            None => Err(ManifestError::EmptyInput),
            Some(Self::Manifest(_)) => {
                let manifests = arrays
                    .iter()
                    .map(|array| array.as_manifest().ok_or_else(mixed_variants))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Manifest(crate::combine::concatenate_refs(
                    &manifests, axis,
                )?))
            }
            Some(Self::Loaded(_)) => {
                let loaded = arrays
                    .iter()
                    .map(|array| array.as_loaded().ok_or_else(mixed_variants))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Loaded(LoadedArray::concatenate(&loaded, axis)?))
            }
        }
    }

    /// Stack arrays along a new axis `axis`.
    ///
    /// # Errors
    /// Returns a [`ManifestError`] if the arrays cannot be stacked.
    pub fn stack(arrays: &[Self], axis: usize) -> Result<Self, ManifestError> {
        let expanded = arrays
            .iter()
            .map(|array| array.expand_dims(axis))
            .collect::<Result<Vec<_>, _>>()?;
        Self::concatenate(&expanded, axis)
    }
}

fn mixed_variants() -> UnsupportedOperationError {
    UnsupportedOperationError::new(
        "concatenation",
        "manifest arrays and loaded arrays cannot be combined",
    )
}
