//! Virtual chunk manifests for [Zarr](https://zarr-specs.readthedocs.io/) datasets.
//!
//! `zarrs_manifest` describes where the chunks of existing archival array files live, without reading or moving their bytes.
//! A source reader records the byte range of each chunk of a variable in a [`ChunkManifest`].
//! A [`ManifestArray`] pairs a manifest with the array shape and [`ArrayEncoding`] of the variable.
//! Manifest arrays from many source files are combined into one logical [`VirtualDataset`], then written out as references that a Zarr V2 reader can fetch bytes through.
//!
//! ## Overview
//!  - [`ChunkEntry`]: the location of one chunk, a `(path, offset, length)` byte range or inline data.
//!  - [`ChunkManifest`]: a dense grid of chunk entries, each present or absent.
//!  - [`ManifestArray`]: a virtual array, with whole chunk slicing, [`expand_dims`](ManifestArray::expand_dims), [`squeeze`](ManifestArray::squeeze), and [`broadcast_to`](ManifestArray::broadcast_to).
//!  - [`concatenate`] and [`stack`]: combine manifest arrays along an axis by reindexing their chunk grids.
//!  - [`VirtualDataset`]: named [`Variable`]s with shared dimension bindings, combined with [`VirtualDataset::merge`] and [`VirtualDataset::concat`].
//!  - [`reference`]: nested (kerchunk version 1) and columnar reference representations.
//!  - [`reader`]: the [`VirtualReader`](reader::VirtualReader) interface of source readers.
//!
//! ## Example
//! ```rust
//! # use std::num::NonZeroU64;
//! use zarrs_manifest::reference::{ReferenceFormat, ReferenceOptions};
//! use zarrs_manifest::{
//!     concatenate, ArrayEncoding, ChunkEntry, ChunkManifest, CodecRegistry, ManifestArray,
//!     Variable, VirtualDataset,
//! };
//!
//! let encoding = ArrayEncoding::new("<f4".into(), vec![NonZeroU64::new(4).unwrap()], 0.0f64.into());
//! let array = |path: &str| -> Result<ManifestArray, Box<dyn std::error::Error>> {
//!     let manifest = ChunkManifest::from_present(vec![1], [(vec![0], ChunkEntry::new(path, 0, 16))])?;
//!     Ok(ManifestArray::new(vec![4], encoding.clone(), manifest)?)
//! };
//! let combined = concatenate(&[array("a.nc")?, array("b.nc")?], 0)?;
//! assert_eq!(combined.shape(), &[8]);
//!
//! let dataset = VirtualDataset::new().with_variable("temp", Variable::new(combined, ["time"])?)?;
//! let references = dataset.to_references(ReferenceFormat::Nested, &ReferenceOptions::default());
//! let read = VirtualDataset::from_references(&references, &CodecRegistry::default())?;
//! assert_eq!(read, dataset);
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `zarrs_manifest` is licensed under either of
//!  - the Apache License, Version 2.0 [LICENSE-APACHE](https://docs.rs/crate/zarrs_manifest/latest/source/LICENCE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license [LICENSE-MIT](https://docs.rs/crate/zarrs_manifest/latest/source/LICENCE-MIT) or <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.

mod chunk_entry;
pub use chunk_entry::{ChunkEntry, INLINE_PREFIX};

mod manifest;
pub use manifest::{ChunkManifest, ChunkManifestIter};

mod encoding;
pub use encoding::ArrayEncoding;

mod error;
pub use error::{
    AlignmentError, DimensionSizeMismatchError, EncodingField, GeometryError,
    IncompatibleEncodingError, InvalidVariableNameError, MalformedReferenceError, ManifestError,
    PartialChunkAlignmentError, ReshapeError, ShapeError, SourceReadError,
    UnsupportedOperationError, VariableConflictError,
};

pub mod array;
pub use array::{ElementwiseOperation, LoadedArray, ManifestArray, VirtualArray};

mod combine;
pub use combine::{concatenate, stack};

pub mod codec;
pub use codec::CodecRegistry;

pub mod config;

mod dataset;
pub use dataset::{ConflictPolicy, Variable, VirtualDataset};

pub mod reader;

pub mod reference;

pub use zarrs_manifest_grid as grid;
pub use zarrs_manifest_metadata as metadata;
