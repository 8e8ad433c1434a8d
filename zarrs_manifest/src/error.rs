//! Manifest errors.
//!
//! Every failure is detected when a manifest, array, or dataset is constructed or combined.
//! Each error carries enough context (variable, axis, input index, or chunk coordinate) to diagnose the problem.

use std::ops::Range;
use std::sync::Arc;

use derive_more::Display;
use thiserror::Error;
use zarrs_manifest_grid::{ArrayIndices, ArrayShape, ChunkShape, IncompatibleDimensionalityError};
use zarrs_manifest_metadata::v2::ArrayMetadataV2DataType;
use zarrs_manifest_metadata::ChunkKeyDecodeError;

/// An invalid chunk manifest.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// A chunk coordinate has the wrong number of components.
    #[error("chunk coordinate {coordinate:?} has dimensionality {}, expected {expected}", .coordinate.len())]
    IncompatibleDimensionality {
        /// The chunk coordinate.
        coordinate: ArrayIndices,
        /// The dimensionality of the chunk grid.
        expected: usize,
    },
    /// A chunk coordinate is outside of the chunk grid.
    #[error("chunk coordinate {coordinate:?} is out of bounds of chunk grid shape {grid_shape:?}")]
    OutOfBounds {
        /// The chunk coordinate.
        coordinate: ArrayIndices,
        /// The chunk grid shape.
        grid_shape: ArrayShape,
    },
    /// A chunk coordinate was given more than once.
    #[error("chunk coordinate {0:?} is duplicated")]
    Duplicate(ArrayIndices),
    /// A chunk coordinate was not given.
    ///
    /// Absent chunks must be given explicitly.
    #[error("chunk coordinate {coordinate:?} of chunk grid shape {grid_shape:?} has no entry or absent marker")]
    Missing {
        /// The chunk coordinate.
        coordinate: ArrayIndices,
        /// The chunk grid shape.
        grid_shape: ArrayShape,
    },
    /// A chunk key could not be decoded.
    #[error(transparent)]
    InvalidChunkKey(#[from] ChunkKeyDecodeError),
    /// The number of cells in the chunk grid exceeds the addressable size.
    #[error("chunk grid shape {0:?} is too large")]
    TooLarge(ArrayShape),
}

/// An array geometry error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The chunk manifest grid does not tile the array shape with the chunk shape.
    #[error("array shape {shape:?} with chunk shape {chunk_shape:?} is incompatible with chunk manifest grid shape {grid_shape:?}")]
    GridShape {
        /// The array shape.
        shape: ArrayShape,
        /// The chunk shape.
        chunk_shape: ChunkShape,
        /// The chunk manifest grid shape.
        grid_shape: ArrayShape,
    },
    /// In-memory data does not match the array shape and data type.
    #[error("data with {got} bytes does not match array shape {shape:?} with data type {data_type}")]
    DataSize {
        /// The array shape.
        shape: ArrayShape,
        /// The data type.
        data_type: ArrayMetadataV2DataType,
        /// The number of bytes.
        got: usize,
    },
}

/// A slice that does not fall on chunk boundaries.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AlignmentError {
    /// The range along `axis` is misaligned or out of bounds.
    #[error("range {range:?} on axis {axis} is not aligned to chunk size {chunk_size} within extent {extent}")]
    Misaligned {
        /// The axis.
        axis: usize,
        /// The requested range.
        range: Range<u64>,
        /// The chunk size along `axis`.
        chunk_size: u64,
        /// The array extent along `axis`.
        extent: u64,
    },
    /// The number of ranges does not match the array dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
}

/// An axis or reshape error for an identity operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReshapeError {
    /// The axis is out of bounds.
    #[error("axis {axis} is out of bounds for an array with dimensionality {dimensionality}")]
    InvalidAxis {
        /// The axis.
        axis: usize,
        /// The array dimensionality.
        dimensionality: usize,
    },
    /// The axis cannot be removed.
    #[error("axis {axis} with size {size} and chunk size {chunk_size} cannot be squeezed")]
    NotSqueezable {
        /// The axis.
        axis: usize,
        /// The array extent along `axis`.
        size: u64,
        /// The chunk size along `axis`.
        chunk_size: u64,
    },
    /// The array cannot be broadcast to the target shape without reading data.
    #[error("array with shape {shape:?} and chunk shape {chunk_shape:?} cannot be broadcast to {target:?}")]
    IncompatibleBroadcast {
        /// The array shape.
        shape: ArrayShape,
        /// The chunk shape.
        chunk_shape: ChunkShape,
        /// The target shape.
        target: ArrayShape,
    },
}

/// An encoding field compared when combining arrays.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum EncodingField {
    /// The data type.
    #[display("dtype")]
    DataType,
    /// The filters and compressor.
    #[display("codecs")]
    Codecs,
    /// The fill value.
    #[display("fill_value")]
    FillValue,
    /// The memory order of chunks.
    #[display("order")]
    Order,
    /// The chunk shape along an axis other than the concatenation axis.
    #[display("chunk_shape")]
    ChunkShape,
}

/// Arrays that cannot be combined because their encodings differ.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("inputs {first} and {second} have incompatible {field}: {first_value} and {second_value}")]
pub struct IncompatibleEncodingError {
    first: usize,
    second: usize,
    field: EncodingField,
    first_value: String,
    second_value: String,
}

impl IncompatibleEncodingError {
    /// Create a new incompatible encoding error between inputs `first` and `second`.
    #[must_use]
    pub fn new(
        first: usize,
        second: usize,
        field: EncodingField,
        first_value: String,
        second_value: String,
    ) -> Self {
        Self {
            first,
            second,
            field,
            first_value,
            second_value,
        }
    }

    /// The offending pair of input indices.
    #[must_use]
    pub const fn inputs(&self) -> (usize, usize) {
        (self.first, self.second)
    }

    /// The encoding field that differs.
    #[must_use]
    pub const fn field(&self) -> EncodingField {
        self.field
    }
}

/// Chunks that would not form a regular grid after concatenation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PartialChunkAlignmentError {
    /// An input other than the last ends with a partial chunk along the concatenation axis.
    #[error("input {input} ends with a partial chunk on axis {axis} (extent {extent}, chunk size {chunk_size}), only the final input may")]
    PartialChunk {
        /// The input index.
        input: usize,
        /// The concatenation axis.
        axis: usize,
        /// The extent of the input along `axis`.
        extent: u64,
        /// The chunk size along `axis`.
        chunk_size: u64,
    },
    /// An input has a different chunk size along the concatenation axis.
    #[error("input {input} has chunk size {got} on axis {axis}, expected {expected}")]
    ChunkSize {
        /// The input index.
        input: usize,
        /// The concatenation axis.
        axis: usize,
        /// The chunk size of the first input.
        expected: u64,
        /// The chunk size of this input.
        got: u64,
    },
}

/// Dimension sizes that do not agree.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DimensionSizeMismatchError {
    /// An input differs in size on an axis other than the concatenation axis.
    #[error("input {input} has size {got} on axis {axis}, expected {expected}")]
    Axis {
        /// The input index.
        input: usize,
        /// The axis.
        axis: usize,
        /// The size of the first input.
        expected: u64,
        /// The size of this input.
        got: u64,
    },
    /// An input differs in dimensionality.
    #[error("input {input} has dimensionality {got}, expected {expected}")]
    Dimensionality {
        /// The input index.
        input: usize,
        /// The dimensionality of the first input.
        expected: usize,
        /// The dimensionality of this input.
        got: usize,
    },
    /// A named dataset dimension is bound to different sizes.
    #[error("dimension {dimension:?} has size {got}, expected {expected}")]
    Dimension {
        /// The dimension name.
        dimension: String,
        /// The size already bound to the dimension.
        expected: u64,
        /// The conflicting size.
        got: u64,
    },
    /// The number of dimension names does not match the array dimensionality.
    #[error("{got} dimension names given for an array with dimensionality {expected}")]
    DimensionNames {
        /// The array dimensionality.
        expected: usize,
        /// The number of dimension names.
        got: usize,
    },
}

/// A variable defined differently by datasets being combined.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("variable {name:?} conflicts: {reason}")]
pub struct VariableConflictError {
    name: String,
    reason: String,
}

impl VariableConflictError {
    /// Create a new variable conflict error.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The name of the conflicting variable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A variable name that cannot be written to a reference document.
///
/// Variable names must be non-empty and must not contain `/`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid variable name {0:?}, names must be non-empty and must not contain '/'")]
pub struct InvalidVariableNameError(String);

impl InvalidVariableNameError {
    /// Create a new invalid variable name error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The invalid variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A reference document that does not describe a valid virtual dataset.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MalformedReferenceError {
    /// The document is not valid JSON or does not have the expected structure.
    #[error("invalid reference document: {0}")]
    InvalidDocument(String),
    /// The reference format version is not supported.
    #[error("unsupported reference version {0}")]
    UnsupportedVersion(serde_json::Value),
    /// A metadata document is invalid.
    #[error("invalid metadata at {key:?}: {reason}")]
    InvalidMetadata {
        /// The reference key.
        key: String,
        /// The reason.
        reason: String,
    },
    /// A variable has chunk references or attributes but no `.zarray`.
    #[error("variable {0:?} has no array metadata")]
    MissingArrayMetadata(String),
    /// A chunk reference value is invalid.
    #[error("invalid chunk reference at {key:?}: {reason}")]
    InvalidChunkReference {
        /// The reference key.
        key: String,
        /// The reason.
        reason: String,
    },
    /// The chunk keys of a variable do not form a valid chunk grid.
    #[error("invalid chunk manifest for variable {variable:?}: {source}")]
    InvalidManifest {
        /// The variable name.
        variable: String,
        /// The manifest error.
        source: ShapeError,
    },
    /// The array metadata of a variable is inconsistent.
    #[error("invalid geometry for variable {variable:?}: {source}")]
    InvalidGeometry {
        /// The variable name.
        variable: String,
        /// The geometry error.
        source: GeometryError,
    },
    /// A codec is not in the codec registry.
    #[error("variable {variable:?} uses unknown codec {id:?}")]
    UnknownCodec {
        /// The variable name.
        variable: String,
        /// The codec id.
        id: String,
    },
    /// The dimension names of a variable are missing or invalid.
    #[error("invalid dimension names for variable {variable:?}: {reason}")]
    InvalidDimensions {
        /// The variable name.
        variable: String,
        /// The reason.
        reason: String,
    },
    /// The columns of a reference table have different lengths.
    #[error("reference table column {column:?} has length {got}, expected {expected}")]
    InvalidColumns {
        /// The column name.
        column: &'static str,
        /// The length of the `variable` column.
        expected: usize,
        /// The length of this column.
        got: usize,
    },
    /// Variables disagree on a dimension size.
    #[error(transparent)]
    DimensionSizeMismatch(#[from] DimensionSizeMismatchError),
}

impl From<serde_json::Error> for MalformedReferenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDocument(err.to_string())
    }
}

/// An operation that would require reading or computing on chunk data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{operation} is not supported: {reason}")]
pub struct UnsupportedOperationError {
    operation: String,
    reason: String,
}

impl UnsupportedOperationError {
    /// Create a new unsupported operation error.
    #[must_use]
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// The unsupported operation.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// A failure reported by a [`VirtualReader`](crate::reader::VirtualReader).
///
/// Passed through unchanged.
#[derive(Clone, Debug, Error)]
#[error("failed to read source {identifier:?}: {source}")]
pub struct SourceReadError {
    identifier: String,
    source: Arc<dyn std::error::Error + Send + Sync>,
}

impl SourceReadError {
    /// Create a new source read error for the source `identifier`.
    pub fn new(
        identifier: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            source: Arc::from(source.into()),
        }
    }

    /// The identifier of the source that failed.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Manifest errors.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// An invalid chunk manifest.
    #[error(transparent)]
    Shape(#[from] ShapeError),
    /// An array geometry error.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// A misaligned slice.
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
    /// An axis or reshape error.
    #[error(transparent)]
    Reshape(#[from] ReshapeError),
    /// Incompatible encodings.
    #[error(transparent)]
    IncompatibleEncoding(#[from] IncompatibleEncodingError),
    /// Misaligned partial chunks.
    #[error(transparent)]
    PartialChunkAlignment(#[from] PartialChunkAlignmentError),
    /// Mismatched dimension sizes.
    #[error(transparent)]
    DimensionSizeMismatch(#[from] DimensionSizeMismatchError),
    /// Conflicting variables.
    #[error(transparent)]
    VariableConflict(#[from] VariableConflictError),
    /// An invalid variable name.
    #[error(transparent)]
    InvalidVariableName(#[from] InvalidVariableNameError),
    /// A malformed reference document.
    #[error(transparent)]
    MalformedReference(#[from] MalformedReferenceError),
    /// An unsupported operation.
    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperationError),
    /// A source read failure.
    #[error(transparent)]
    SourceRead(#[from] SourceReadError),
    /// A combination was requested with no inputs.
    #[error("at least one input is required")]
    EmptyInput,
}
