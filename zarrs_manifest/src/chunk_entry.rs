use std::sync::Arc;

use base64::{prelude::BASE64_STANDARD, Engine};
use bytes::Bytes;
use derive_more::Display;

/// The prefix of base64 encoded inline chunk data in reference documents.
pub const INLINE_PREFIX: &str = "base64:";

/// The location of one chunk.
///
/// A chunk is either a byte range of a source file, or its raw (encoded) bytes held inline.
/// Entries are cheap to clone: paths are reference counted and inline data is shared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum ChunkEntry {
    /// A byte range of a source file.
    #[display("{path}[{offset}..{}]", offset.saturating_add(*length))]
    Reference {
        /// The path or URL of the source file.
        path: Arc<str>,
        /// The byte offset of the chunk within the file.
        offset: u64,
        /// The byte length of the chunk.
        length: u64,
    },
    /// Raw chunk bytes held inline.
    #[display("<inline {} bytes>", _0.len())]
    Inline(Bytes),
}

impl ChunkEntry {
    /// Create a new byte range chunk entry.
    pub fn new(path: impl Into<Arc<str>>, offset: u64, length: u64) -> Self {
        Self::Reference {
            path: path.into(),
            offset,
            length,
        }
    }

    /// Create a new inline chunk entry.
    pub fn new_inline(data: impl Into<Bytes>) -> Self {
        Self::Inline(data.into())
    }

    /// Return the source path, or [`None`] for an inline chunk.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Reference { path, .. } => Some(path),
            Self::Inline(_) => None,
        }
    }

    /// Return the byte offset, which is zero for an inline chunk.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Reference { offset, .. } => *offset,
            Self::Inline(_) => 0,
        }
    }

    /// Return the byte length of the chunk.
    #[must_use]
    pub fn length(&self) -> u64 {
        match self {
            Self::Reference { length, .. } => *length,
            Self::Inline(data) => data.len() as u64,
        }
    }

    /// Return the inline chunk data, or [`None`] for a byte range.
    #[must_use]
    pub fn inline_data(&self) -> Option<&Bytes> {
        match self {
            Self::Reference { .. } => None,
            Self::Inline(data) => Some(data),
        }
    }

    /// Returns true if the chunk is held inline.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    /// Return a copy of the entry with its path replaced by `rename(path)`.
    ///
    /// Inline chunks are unchanged.
    #[must_use]
    pub fn with_renamed_path(&self, rename: impl FnOnce(&str) -> String) -> Self {
        match self {
            Self::Reference {
                path,
                offset,
                length,
            } => Self::Reference {
                path: rename(path).into(),
                offset: *offset,
                length: *length,
            },
            Self::Inline(_) => self.clone(),
        }
    }

    /// Encode inline data as a `base64:` prefixed string.
    #[must_use]
    pub fn encode_inline(data: &[u8]) -> String {
        format!("{INLINE_PREFIX}{}", BASE64_STANDARD.encode(data))
    }

    /// Decode a `base64:` prefixed string to inline data.
    ///
    /// Returns [`None`] if `value` does not have the `base64:` prefix.
    ///
    /// # Errors
    /// Returns a [`base64::DecodeError`] if the base64 payload is invalid.
    pub fn decode_inline(value: &str) -> Option<Result<Bytes, base64::DecodeError>> {
        value
            .strip_prefix(INLINE_PREFIX)
            .map(|encoded| BASE64_STANDARD.decode(encoded).map(Bytes::from))
    }
}
