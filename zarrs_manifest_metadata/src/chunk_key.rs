use derive_more::Display;
use thiserror::Error;

/// A chunk key separator.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Default)]
pub enum ChunkKeySeparator {
    /// The slash '/' character.
    #[display("/")]
    Slash,
    /// The dot '.' character.
    #[display(".")]
    #[default]
    Dot,
}

impl ChunkKeySeparator {
    /// Return the separator as a [`char`].
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Slash => '/',
            Self::Dot => '.',
        }
    }
}

impl TryFrom<char> for ChunkKeySeparator {
    type Error = char;

    fn try_from(separator: char) -> Result<Self, Self::Error> {
        match separator {
            '/' => Ok(Self::Slash),
            '.' => Ok(Self::Dot),
            _ => Err(separator),
        }
    }
}

impl serde::Serialize for ChunkKeySeparator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_char(self.as_char())
    }
}

impl<'de> serde::Deserialize<'de> for ChunkKeySeparator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(d)?;
        if let serde_json::Value::String(separator) = value {
            if separator == "/" {
                return Ok(Self::Slash);
            } else if separator == "." {
                return Ok(Self::Dot);
            }
        }
        Err(serde::de::Error::custom(
            "chunk key separator must be a `.` or `/`.",
        ))
    }
}

/// A chunk key decoding error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChunkKeyDecodeError {
    /// A component of the chunk key is negative.
    #[error("chunk key {0:?} has a negative component")]
    NegativeComponent(String),
    /// A component of the chunk key is not an unsigned integer.
    #[error("chunk key {0:?} has a component that is not an unsigned integer")]
    InvalidComponent(String),
    /// The number of components does not match the dimensionality of the array.
    #[error("chunk key {key:?} has {got} components, expected {expected}")]
    IncompatibleDimensionality {
        /// The chunk key.
        key: String,
        /// The number of components in the key.
        got: usize,
        /// The dimensionality of the array.
        expected: usize,
    },
}

/// Encode chunk grid indices into a chunk key such as `"0.2.1"`.
///
/// The chunk key of a zero-dimensional array is `"0"`.
#[must_use]
pub fn encode_chunk_key(chunk_grid_indices: &[u64], separator: ChunkKeySeparator) -> String {
    if chunk_grid_indices.is_empty() {
        return "0".to_string();
    }
    chunk_grid_indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&separator.to_string())
}

/// Decode a chunk key into chunk grid indices of an array with `dimensionality` dimensions.
///
/// # Errors
/// Returns a [`ChunkKeyDecodeError`] if a component is negative or not an unsigned integer, or the number of components does not match `dimensionality`.
pub fn decode_chunk_key(
    key: &str,
    separator: ChunkKeySeparator,
    dimensionality: usize,
) -> Result<Vec<u64>, ChunkKeyDecodeError> {
    if dimensionality == 0 {
        return if key == "0" {
            Ok(Vec::new())
        } else {
            Err(ChunkKeyDecodeError::IncompatibleDimensionality {
                key: key.to_string(),
                got: key.split(separator.as_char()).count(),
                expected: 0,
            })
        };
    }
    let components: Vec<&str> = key.split(separator.as_char()).collect();
    if components.len() != dimensionality {
        return Err(ChunkKeyDecodeError::IncompatibleDimensionality {
            key: key.to_string(),
            got: components.len(),
            expected: dimensionality,
        });
    }
    components
        .into_iter()
        .map(|component| {
            if component.starts_with('-') && component[1..].parse::<u64>().is_ok() {
                Err(ChunkKeyDecodeError::NegativeComponent(key.to_string()))
            } else if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                Err(ChunkKeyDecodeError::InvalidComponent(key.to_string()))
            } else {
                component
                    .parse::<u64>()
                    .map_err(|_| ChunkKeyDecodeError::InvalidComponent(key.to_string()))
            }
        })
        .collect()
}
