use std::num::NonZeroU64;

use zarrs_manifest_grid::{ArrayShape, ChunkShape};
use zarrs_manifest_metadata::v2::{
    ArrayMetadataV2, ArrayMetadataV2DataType, ArrayMetadataV2Order, FillValueMetadataV2,
    MetadataV2,
};
use zarrs_manifest_metadata::ChunkKeySeparator;

use crate::EncodingField;

/// How the chunks of an array are encoded.
///
/// Holds the data type, chunk shape, codec chain (filters and compressor), fill value, and memory order.
/// Arrays are encoding compatible if everything except the chunk shape is identical.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayEncoding {
    data_type: ArrayMetadataV2DataType,
    chunk_shape: ChunkShape,
    fill_value: FillValueMetadataV2,
    filters: Vec<MetadataV2>,
    compressor: Option<MetadataV2>,
    order: ArrayMetadataV2Order,
}

impl ArrayEncoding {
    /// Create a new array encoding with no filters, no compressor, and `C` order.
    #[must_use]
    pub fn new(
        data_type: ArrayMetadataV2DataType,
        chunk_shape: ChunkShape,
        fill_value: FillValueMetadataV2,
    ) -> Self {
        Self {
            data_type,
            chunk_shape,
            fill_value,
            filters: Vec::new(),
            compressor: None,
            order: ArrayMetadataV2Order::C,
        }
    }

    /// Set the filters.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<MetadataV2>) -> Self {
        self.filters = filters;
        self
    }

    /// Set the compressor.
    #[must_use]
    pub fn with_compressor(mut self, compressor: Option<MetadataV2>) -> Self {
        self.compressor = compressor;
        self
    }

    /// Set the memory order of chunks.
    #[must_use]
    pub fn with_order(mut self, order: ArrayMetadataV2Order) -> Self {
        self.order = order;
        self
    }

    /// Set the chunk shape.
    #[must_use]
    pub fn with_chunk_shape(mut self, chunk_shape: ChunkShape) -> Self {
        self.chunk_shape = chunk_shape;
        self
    }

    /// Return the data type.
    #[must_use]
    pub fn data_type(&self) -> &ArrayMetadataV2DataType {
        &self.data_type
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[NonZeroU64] {
        &self.chunk_shape
    }

    /// Return the chunk shape as an [`ArrayShape`].
    #[must_use]
    pub fn chunk_shape_u64(&self) -> ArrayShape {
        self.chunk_shape.iter().map(|s| s.get()).collect()
    }

    /// Return the fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValueMetadataV2 {
        &self.fill_value
    }

    /// Return the filters.
    #[must_use]
    pub fn filters(&self) -> &[MetadataV2] {
        &self.filters
    }

    /// Return the compressor.
    #[must_use]
    pub fn compressor(&self) -> Option<&MetadataV2> {
        self.compressor.as_ref()
    }

    /// Return an iterator over every codec in the chain, filters first.
    pub fn codecs(&self) -> impl Iterator<Item = &MetadataV2> {
        self.filters.iter().chain(self.compressor.as_ref())
    }

    /// Return the memory order of chunks.
    #[must_use]
    pub fn order(&self) -> ArrayMetadataV2Order {
        self.order
    }

    /// Return the first field (other than the chunk shape) that differs from `other`.
    ///
    /// Returns [`None`] if the encodings are compatible.
    #[must_use]
    pub fn incompatible_field(&self, other: &Self) -> Option<EncodingField> {
        if self.data_type != other.data_type {
            Some(EncodingField::DataType)
        } else if self.filters != other.filters || self.compressor != other.compressor {
            Some(EncodingField::Codecs)
        } else if self.fill_value != other.fill_value {
            Some(EncodingField::FillValue)
        } else if self.order != other.order {
            Some(EncodingField::Order)
        } else {
            None
        }
    }

    /// Describe `field` of this encoding for error messages.
    #[must_use]
    pub fn describe(&self, field: EncodingField) -> String {
        match field {
            EncodingField::DataType => self.data_type.to_string(),
            EncodingField::Codecs => format!(
                "[{}]",
                self.codecs().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
            EncodingField::FillValue => self.fill_value.to_string(),
            EncodingField::Order => self.order.to_string(),
            EncodingField::ChunkShape => format!("{:?}", self.chunk_shape_u64()),
        }
    }

    /// Create the encoding of Zarr V2 array metadata.
    #[must_use]
    pub fn from_array_metadata(metadata: &ArrayMetadataV2) -> Self {
        Self {
            data_type: metadata.dtype.clone(),
            chunk_shape: metadata.chunks.clone(),
            fill_value: metadata.fill_value.clone(),
            filters: metadata.filters.clone().unwrap_or_default(),
            compressor: metadata.compressor.clone(),
            order: metadata.order,
        }
    }

    /// Create Zarr V2 array metadata for an array with `shape` and this encoding.
    #[must_use]
    pub fn to_array_metadata(
        &self,
        shape: ArrayShape,
        separator: ChunkKeySeparator,
    ) -> ArrayMetadataV2 {
        ArrayMetadataV2::new(
            shape,
            self.chunk_shape.clone(),
            self.data_type.clone(),
            self.fill_value.clone(),
            self.compressor.clone(),
        )
        .with_filters((!self.filters.is_empty()).then(|| self.filters.clone()))
        .with_order(self.order)
        .with_dimension_separator(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoding() -> ArrayEncoding {
        ArrayEncoding::new(
            "<f4".into(),
            vec![NonZeroU64::new(10).unwrap()],
            FillValueMetadataV2::NaN,
        )
        .with_compressor(Some(MetadataV2::new("zlib")))
    }

    #[test]
    fn encoding_compatibility() {
        let a = encoding();
        assert_eq!(a.incompatible_field(&a.clone()), None);
        // chunk shape is checked per axis when combining
        let b = a.clone().with_chunk_shape(vec![NonZeroU64::new(5).unwrap()]);
        assert_eq!(a.incompatible_field(&b), None);

        let b = ArrayEncoding::new(
            "<f8".into(),
            vec![NonZeroU64::new(10).unwrap()],
            FillValueMetadataV2::NaN,
        );
        assert_eq!(a.incompatible_field(&b), Some(EncodingField::DataType));
        assert_eq!(a.describe(EncodingField::DataType), "<f4");

        let b = a.clone().with_compressor(None);
        assert_eq!(a.incompatible_field(&b), Some(EncodingField::Codecs));
        assert_eq!(a.describe(EncodingField::Codecs), r#"[{"id":"zlib"}]"#);

        let b = a.clone().with_filters(vec![MetadataV2::new("shuffle")]);
        assert_eq!(a.incompatible_field(&b), Some(EncodingField::Codecs));

        let b = ArrayEncoding::new(
            "<f4".into(),
            vec![NonZeroU64::new(10).unwrap()],
            FillValueMetadataV2::from(0.0),
        )
        .with_compressor(Some(MetadataV2::new("zlib")));
        assert_eq!(a.incompatible_field(&b), Some(EncodingField::FillValue));

        let b = a.clone().with_order(ArrayMetadataV2Order::F);
        assert_eq!(a.incompatible_field(&b), Some(EncodingField::Order));
    }

    #[test]
    fn encoding_array_metadata() {
        let a = encoding().with_filters(vec![MetadataV2::new("shuffle")]);
        let metadata = a.to_array_metadata(vec![25], ChunkKeySeparator::Slash);
        assert_eq!(metadata.shape, vec![25]);
        assert_eq!(metadata.dimension_separator, ChunkKeySeparator::Slash);
        assert_eq!(ArrayEncoding::from_array_metadata(&metadata), a);

        let metadata = encoding().to_array_metadata(vec![25], ChunkKeySeparator::Dot);
        assert_eq!(metadata.filters, None);
        assert_eq!(ArrayEncoding::from_array_metadata(&metadata), encoding());
    }
}
