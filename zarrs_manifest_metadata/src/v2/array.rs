use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{ArrayShape, ChunkKeySeparator, ChunkShape};

use super::MetadataV2;

/// Zarr array metadata (storage specification v2).
///
/// An example `JSON` document for a Zarr V2 array:
/// ```json
/// {
///     "chunks": [
///         1000,
///         1000
///     ],
///     "compressor": {
///         "id": "blosc",
///         "cname": "lz4",
///         "clevel": 5,
///         "shuffle": 1
///     },
///     "dtype": "<f8",
///     "fill_value": "NaN",
///     "filters": [
///         {"id": "delta", "dtype": "<f8", "astype": "<f4"}
///     ],
///     "order": "C",
///     "shape": [
///         10000,
///         10000
///     ],
///     "zarr_format": 2
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadataV2 {
    /// An integer defining the version of the storage specification to which the array adheres. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// An array of integers providing the length of each dimension of the Zarr array.
    pub shape: ArrayShape,
    /// A list of integers defining the length of each dimension of a chunk of the array.
    pub chunks: ChunkShape,
    /// The data type of the Zarr array.
    pub dtype: ArrayMetadataV2DataType,
    /// A JSON object identifying the primary compression codec and providing configuration parameters, or null if no compressor is to be used.
    pub compressor: Option<MetadataV2>,
    /// A scalar value providing the default value to use for uninitialized portions of the array, or null if no fill value is to be used.
    pub fill_value: FillValueMetadataV2,
    /// Either “C” or “F”, defining the layout of bytes within each chunk of the array.
    pub order: ArrayMetadataV2Order,
    /// A list of JSON objects providing codec configurations, or null if no filters are to be applied.
    #[serde(default)]
    pub filters: Option<Vec<MetadataV2>>,
    /// If present, either the string "." or "/" defining the separator placed between the dimensions of a chunk.
    #[serde(default = "chunk_key_separator_default_zarr_v2")]
    pub dimension_separator: ChunkKeySeparator,
}

const fn chunk_key_separator_default_zarr_v2() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

impl ArrayMetadataV2 {
    /// Create Zarr V2 array metadata with `C` order, no filters, and `.` separated chunk keys.
    #[must_use]
    pub fn new(
        shape: ArrayShape,
        chunks: ChunkShape,
        dtype: ArrayMetadataV2DataType,
        fill_value: FillValueMetadataV2,
        compressor: Option<MetadataV2>,
    ) -> Self {
        Self {
            zarr_format: monostate::MustBe!(2u64),
            shape,
            chunks,
            dtype,
            compressor,
            fill_value,
            order: ArrayMetadataV2Order::C,
            filters: None,
            dimension_separator: ChunkKeySeparator::Dot,
        }
    }

    /// Set the filters.
    #[must_use]
    pub fn with_filters(mut self, filters: Option<Vec<MetadataV2>>) -> Self {
        self.filters = filters;
        self
    }

    /// Set the memory order.
    #[must_use]
    pub fn with_order(mut self, order: ArrayMetadataV2Order) -> Self {
        self.order = order;
        self
    }

    /// Set the dimension separator.
    #[must_use]
    pub fn with_dimension_separator(mut self, dimension_separator: ChunkKeySeparator) -> Self {
        self.dimension_separator = dimension_separator;
        self
    }
}

/// Structure data type metadata.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(
    from = "DataTypeMetadataV2StructuredTuple",
    into = "DataTypeMetadataV2StructuredTuple"
)]
pub struct DataTypeMetadataV2Structured {
    /// Field name.
    pub fieldname: String,
    /// Data type.
    pub datatype: String,
    /// Subarray shape.
    pub shape: Option<Vec<u64>>,
}

#[derive(Serialize, Deserialize)]
struct DataTypeMetadataV2StructuredTuple(
    String,
    String,
    #[serde(skip_serializing_if = "Option::is_none", default)] Option<Vec<u64>>,
);

impl From<DataTypeMetadataV2StructuredTuple> for DataTypeMetadataV2Structured {
    fn from(value: DataTypeMetadataV2StructuredTuple) -> Self {
        let DataTypeMetadataV2StructuredTuple(fieldname, datatype, shape) = value;
        Self {
            fieldname,
            datatype,
            shape,
        }
    }
}

impl From<DataTypeMetadataV2Structured> for DataTypeMetadataV2StructuredTuple {
    fn from(value: DataTypeMetadataV2Structured) -> Self {
        Self(value.fieldname, value.datatype, value.shape)
    }
}

/// Zarr V2 data type metadata.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Display)]
#[serde(untagged)]
pub enum ArrayMetadataV2DataType {
    /// A simple data type, such as `"<f8"`.
    #[display("{_0}")]
    Simple(String),
    /// A structured data type.
    #[display("{}", serde_json::to_string(_0).unwrap_or_default())]
    Structured(Vec<DataTypeMetadataV2Structured>),
}

impl From<&str> for ArrayMetadataV2DataType {
    fn from(data_type: &str) -> Self {
        Self::Simple(data_type.to_string())
    }
}

impl ArrayMetadataV2DataType {
    /// Return the size in bytes of one element of the data type.
    ///
    /// Returns [`None`] for variable sized (e.g. `"|O"`) or unrecognised data types, or if the size overflows a [`u64`].
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Simple(data_type) => simple_data_type_size(data_type),
            Self::Structured(fields) => fields.iter().try_fold(0u64, |size, field| {
                let elements = field
                    .shape
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))?;
                size.checked_add(simple_data_type_size(&field.datatype)?.checked_mul(elements)?)
            }),
        }
    }
}

fn simple_data_type_size(data_type: &str) -> Option<u64> {
    let mut chars = data_type.chars();
    if !matches!(chars.next()?, '<' | '>' | '|') {
        return None;
    }
    let kind = chars.next()?;
    let rest = chars.as_str();
    // datetimes carry a unit suffix, e.g. "<M8[ns]"
    let digits = rest.split('[').next().unwrap_or_default();
    let count: u64 = digits.parse().ok()?;
    match kind {
        'b' | 'i' | 'u' | 'f' | 'c' | 'M' | 'm' | 'S' | 'V' => Some(count),
        'U' => count.checked_mul(4),
        _ => None,
    }
}

/// A scalar value providing the default value to use for uninitialized portions of the array, or null if no fill value is to be used.
#[derive(Clone, PartialEq, Eq, Debug, Display)]
pub enum FillValueMetadataV2 {
    /// No fill value.
    #[display("null")]
    Null,
    /// NaN (not-a-number).
    #[display("NaN")]
    NaN,
    /// Positive infinity.
    #[display("Infinity")]
    Infinity,
    /// Negative infinity.
    #[display("-Infinity")]
    NegInfinity,
    /// A number.
    #[display("{_0}")]
    Number(serde_json::Number),
    /// A string, such as a base64 encoded fill value of a fixed length bytes data type.
    #[display("{_0:?}")]
    String(String),
}

impl From<i64> for FillValueMetadataV2 {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for FillValueMetadataV2 {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for FillValueMetadataV2 {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::NaN
        } else if value == f64::INFINITY {
            Self::Infinity
        } else if value == f64::NEG_INFINITY {
            Self::NegInfinity
        } else {
            serde_json::Number::from_f64(value).map_or(Self::Null, Self::Number)
        }
    }
}

impl<'de> serde::Deserialize<'de> for FillValueMetadataV2 {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum FillValueMetadataV2Type {
            String(String),
            Number(serde_json::Number),
            Null,
        }
        let fill_value = FillValueMetadataV2Type::deserialize(d)?;
        match fill_value {
            FillValueMetadataV2Type::String(string) => match string.as_str() {
                "NaN" => Ok(Self::NaN),
                "Infinity" => Ok(Self::Infinity),
                "-Infinity" => Ok(Self::NegInfinity),
                _ => Ok(Self::String(string)),
            },
            FillValueMetadataV2Type::Number(number) => Ok(Self::Number(number)),
            FillValueMetadataV2Type::Null => Ok(Self::Null),
        }
    }
}

impl Serialize for FillValueMetadataV2 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::NaN => serializer.serialize_str("NaN"),
            Self::Infinity => serializer.serialize_str("Infinity"),
            Self::NegInfinity => serializer.serialize_str("-Infinity"),
            Self::Number(number) => number.serialize(serializer),
            Self::String(string) => serializer.serialize_str(string),
        }
    }
}

/// The layout of bytes within each chunk of the array.
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Debug, Display, Default)]
pub enum ArrayMetadataV2Order {
    /// Row-major order. The last dimension varies fastest.
    #[default]
    C,
    /// Column-major order. The first dimension varies fastest.
    F,
}
