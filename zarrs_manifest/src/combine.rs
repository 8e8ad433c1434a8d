//! Combining manifest arrays.
//!
//! Concatenation lays the chunk manifest of each input at a cumulative chunk offset along the concatenation axis.
//! No chunk data is read, and chunk entries are shared with the inputs.

use crate::{
    ChunkManifest, DimensionSizeMismatchError, EncodingField, IncompatibleEncodingError,
    ManifestArray, ManifestError, PartialChunkAlignmentError, ReshapeError,
};

/// Concatenate manifest arrays along `axis`.
///
/// The inputs must:
///  - be encoding compatible (same data type, codecs, fill value, and order),
///  - have the same chunk shape, including along `axis` since Zarr V2 metadata cannot describe an irregular chunk grid,
///  - have the same size on every axis other than `axis`, and
///  - have only full chunks along `axis`, except for the final input.
///
/// The order of `arrays` is preserved.
///
/// # Errors
/// Returns a [`ManifestError`] describing the first incompatible input.
pub fn concatenate(arrays: &[ManifestArray], axis: usize) -> Result<ManifestArray, ManifestError> {
    concatenate_refs(&arrays.iter().collect::<Vec<_>>(), axis)
}

/// Stack manifest arrays along a new axis `axis`.
///
/// The new axis has chunk size 1 and one chunk per input.
/// The inputs must be encoding compatible and have identical shapes and chunk shapes.
///
/// # Errors
/// Returns a [`ManifestError`] if `axis` is greater than the dimensionality of the inputs or the inputs cannot be concatenated.
pub fn stack(arrays: &[ManifestArray], axis: usize) -> Result<ManifestArray, ManifestError> {
    let expanded = arrays
        .iter()
        .map(|array| array.expand_dims(axis))
        .collect::<Result<Vec<_>, _>>()?;
    concatenate(&expanded, axis)
}

pub(crate) fn concatenate_refs(
    arrays: &[&ManifestArray],
    axis: usize,
) -> Result<ManifestArray, ManifestError> {
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
        if array.dimensionality() != first.dimensionality() {
            return Err(DimensionSizeMismatchError::Dimensionality {
                input,
                expected: first.dimensionality(),
                got: array.dimensionality(),
            }
            .into());
        }
        check_encoding(first, array, input, axis)?;
    }

    let chunk_size = first.encoding().chunk_shape()[axis].get();
    for (input, array) in arrays.iter().enumerate() {
        if input + 1 < arrays.len() && !array.chunk_grid().is_full_along(axis) {
            return Err(PartialChunkAlignmentError::PartialChunk {
                input,
                axis,
                extent: array.shape()[axis],
                chunk_size,
            }
            .into());
        }
        check_sizes(first.shape(), array.shape(), input, axis)?;
    }

    let mut shape = first.shape().to_vec();
    shape[axis] = arrays.iter().map(|array| array.shape()[axis]).sum();
    let manifest = ChunkManifest::concatenate(
        &arrays
            .iter()
            .map(|array| array.manifest())
            .collect::<Vec<_>>(),
        axis,
    );
    log::debug!(
        "concatenated {} manifest arrays along axis {axis} to shape {shape:?}",
        arrays.len()
    );
    Ok(first.with_parts(shape, first.encoding().clone(), manifest))
}

fn check_encoding(
    first: &ManifestArray,
    array: &ManifestArray,
    input: usize,
    axis: usize,
) -> Result<(), ManifestError> {
    let incompatible = |field| {
        IncompatibleEncodingError::new(
            0,
            input,
            field,
            first.encoding().describe(field),
            array.encoding().describe(field),
        )
    };
    if let Some(field) = first.encoding().incompatible_field(array.encoding()) {
        return Err(incompatible(field).into());
    }
    let first_chunks = first.encoding().chunk_shape();
    let chunks = array.encoding().chunk_shape();
    for (i, (expected, got)) in std::iter::zip(first_chunks, chunks).enumerate() {
        if expected == got {
            continue;
        }
        return Err(if i == axis {
            PartialChunkAlignmentError::ChunkSize {
                input,
                axis,
                expected: expected.get(),
                got: got.get(),
            }
            .into()
        } else {
            incompatible(EncodingField::ChunkShape).into()
        });
    }
    Ok(())
}

/// Check that `shape` matches `expected` in dimensionality and on every axis other than `axis`.
pub(crate) fn check_sizes(
    expected: &[u64],
    shape: &[u64],
    input: usize,
    axis: usize,
) -> Result<(), DimensionSizeMismatchError> {
    if shape.len() != expected.len() {
        return Err(DimensionSizeMismatchError::Dimensionality {
            input,
            expected: expected.len(),
            got: shape.len(),
        });
    }
    for (i, (&expected, &got)) in std::iter::zip(expected, shape).enumerate() {
        if i != axis && expected != got {
            return Err(DimensionSizeMismatchError::Axis {
                input,
                axis: i,
                expected,
                got,
            });
        }
    }
    Ok(())
}
