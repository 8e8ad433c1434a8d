//! The codec registry.
//!
//! Deserialization rejects any codec whose `id` is not in the [`CodecRegistry`] it is given.
//! The registry is an explicit value rather than process-wide state, so callers decide which codecs a downstream reader will be able to decode.

use std::collections::BTreeSet;

use zarrs_manifest_metadata::v2::MetadataV2;

/// Codec identifiers of the `numcodecs` codecs commonly found in Zarr V2 arrays and reference documents.
pub const NUMCODECS_IDS: &[&str] = &[
    "adler32",
    "astype",
    "bitround",
    "blosc",
    "bz2",
    "categorize",
    "crc32",
    "delta",
    "fixedscaleoffset",
    "fletcher32",
    "gzip",
    "lz4",
    "lzma",
    "packbits",
    "quantize",
    "shuffle",
    "zlib",
    "zstd",
];

/// A set of known codec identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecRegistry {
    ids: BTreeSet<String>,
}

impl CodecRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    /// Create a registry holding [`NUMCODECS_IDS`].
    #[must_use]
    pub fn numcodecs() -> Self {
        Self {
            ids: NUMCODECS_IDS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Register a codec identifier.
    ///
    /// Returns `true` if the identifier was not already registered.
    pub fn register(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Unregister a codec identifier.
    ///
    /// Returns `true` if the identifier was registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if the codec of `metadata` is registered.
    #[must_use]
    pub fn supports(&self, metadata: &MetadataV2) -> bool {
        self.contains(metadata.id())
    }

    /// Returns the number of registered codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no codecs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Return an iterator over the registered codec identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::numcodecs()
    }
}
