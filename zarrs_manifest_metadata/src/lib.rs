//! [Zarr](https://zarr-specs.readthedocs.io/) V2 metadata support for the [`zarrs_manifest`](https://docs.rs/zarrs_manifest/latest/zarrs_manifest/index.html) crate.
//!
//! Virtual references describe each array with Zarr V2 metadata documents:
//!  - [`v2::ArrayMetadataV2`] (`.zarray`),
//!  - [`v2::GroupMetadataV2`] (`.zgroup`), and
//!  - [`Attributes`] (`.zattrs`).
//!
//! Chunks are addressed by chunk keys such as `"0.2.1"`, see [`encode_chunk_key`] and [`decode_chunk_key`].
//!
//! ## Licence
//! `zarrs_manifest_metadata` is licensed under either of
//!  - the Apache License, Version 2.0 [LICENSE-APACHE](https://docs.rs/crate/zarrs_manifest_metadata/latest/source/LICENCE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license [LICENSE-MIT](https://docs.rs/crate/zarrs_manifest_metadata/latest/source/LICENCE-MIT) or <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.

use std::num::NonZeroU64;

use derive_more::{Deref, DerefMut, From, Into};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod v2;

mod chunk_key;
pub use chunk_key::{decode_chunk_key, encode_chunk_key, ChunkKeyDecodeError, ChunkKeySeparator};

/// An array shape.
pub type ArrayShape = Vec<u64>;

/// A chunk shape. All dimensions are non-zero.
pub type ChunkShape = Vec<NonZeroU64>;

/// User defined attributes, as stored in a `.zattrs` document.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Codec configuration metadata.
///
/// A JSON object holding every field of a codec definition except its identifier.
#[derive(
    Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Default, Deref, DerefMut, From, Into,
)]
#[serde(transparent)]
pub struct Configuration(serde_json::Map<String, serde_json::Value>);

impl Configuration {
    /// Try and convert the configuration to a specific serializable configuration.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if the configuration cannot be converted.
    pub fn to_typed<TConfiguration: DeserializeOwned>(
        &self,
    ) -> Result<TConfiguration, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.0.clone()))
    }

    /// Create a configuration from a serializable configuration.
    ///
    /// # Errors
    /// Returns a [`serde_json::Error`] if `configuration` does not serialize to a JSON object.
    pub fn from_typed<TConfiguration: Serialize>(
        configuration: &TConfiguration,
    ) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(configuration)? {
            serde_json::Value::Object(map) => Ok(Self(map)),
            _ => Err(serde::de::Error::custom(
                "configuration must be a JSON object",
            )),
        }
    }
}
