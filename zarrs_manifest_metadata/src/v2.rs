//! Zarr V2 array and group metadata documents.

mod array;
pub use array::{
    ArrayMetadataV2, ArrayMetadataV2DataType, ArrayMetadataV2Order, DataTypeMetadataV2Structured,
    FillValueMetadataV2,
};

mod group;
pub use group::GroupMetadataV2;

mod metadata;
pub use metadata::MetadataV2;
