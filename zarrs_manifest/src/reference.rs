//! Reference documents.
//!
//! A [`VirtualDataset`] is written to and read from two reference representations:
//!  - [`NestedReferences`]: a kerchunk (version 1) style JSON mapping of Zarr V2 keys to metadata documents and chunk references, and
//!  - [`ReferenceTable`]: a columnar table of chunk references with the same metadata documents held alongside.
//!
//! Both hold the same metadata documents:
//!  - `.zgroup` and `.zattrs` (the dataset attributes), then for each variable in name order
//!  - `<variable>/.zarray` and `<variable>/.zattrs` (the variable attributes, plus the dimension names as `_ARRAY_DIMENSIONS`).
//!
//! Chunks are keyed by `<variable>/<chunk key>` in row-major order.
//! Absent chunks are omitted, and inline chunks are written as `base64:` prefixed strings.
//! Loaded variables are written as a single inline uncompressed chunk and marked with the `_LOADED_ARRAY` attribute, so they read back as loaded arrays.

mod columnar;
mod nested;
mod options;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use derive_more::{Display, From};
use serde::Serialize;
use serde_json::Value;
use zarrs_manifest_metadata::v2::{ArrayMetadataV2, GroupMetadataV2};
use zarrs_manifest_metadata::{encode_chunk_key, Attributes};

pub use columnar::{ReferenceRow, ReferenceTable, ESCAPED_PATH_PREFIX};
pub use nested::NestedReferences;
pub use options::ReferenceOptions;

use crate::config::global_config;
use crate::{
    ArrayEncoding, ChunkEntry, ChunkManifest, CodecRegistry, GeometryError, LoadedArray,
    ManifestArray, MalformedReferenceError, Variable, VirtualArray, VirtualDataset,
};

/// The attribute holding the dimension names of a variable.
pub const ARRAY_DIMENSIONS_KEY: &str = "_ARRAY_DIMENSIONS";

/// The attribute marking a variable held in memory as a [`LoadedArray`].
pub const LOADED_ARRAY_KEY: &str = "_LOADED_ARRAY";

/// A reference representation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Display)]
pub enum ReferenceFormat {
    /// [`NestedReferences`].
    #[default]
    #[display("nested")]
    Nested,
    /// [`ReferenceTable`].
    #[display("columnar")]
    Columnar,
}

/// References to the chunks of a [`VirtualDataset`].
#[derive(Clone, Debug, PartialEq, From)]
pub enum References {
    /// Nested references.
    Nested(NestedReferences),
    /// A columnar reference table.
    Columnar(ReferenceTable),
}

impl References {
    /// Return the format of the references.
    #[must_use]
    pub fn format(&self) -> ReferenceFormat {
        match self {
            Self::Nested(_) => ReferenceFormat::Nested,
            Self::Columnar(_) => ReferenceFormat::Columnar,
        }
    }
}

impl VirtualDataset {
    /// Write the dataset as references in `format`.
    #[must_use]
    pub fn to_references(&self, format: ReferenceFormat, options: &ReferenceOptions) -> References {
        let documents = DatasetDocuments::new(self, options);
        match format {
            ReferenceFormat::Nested => {
                NestedReferences::from_documents(documents, options.path_templates()).into()
            }
            ReferenceFormat::Columnar => ReferenceTable::from_documents(documents).into(),
        }
    }

    /// Read a dataset from references.
    ///
    /// Codecs are checked against `registry` if [validate codecs](crate::config::Config#validate-codecs) is enabled.
    ///
    /// # Errors
    /// Returns a [`MalformedReferenceError`] if the references do not describe a valid dataset.
    pub fn from_references(
        references: &References,
        registry: &CodecRegistry,
    ) -> Result<Self, MalformedReferenceError> {
        let parts = match references {
            References::Nested(nested) => nested.to_parts()?,
            References::Columnar(table) => table.to_parts()?,
        };
        parts.into_dataset(registry)
    }
}

/// A chunk reference of a variable.
struct ChunkReference<'a> {
    variable: &'a str,
    chunk_key: String,
    entry: ChunkEntry,
}

/// The metadata documents and chunk references of a dataset, in reference order.
struct DatasetDocuments<'a> {
    metadata: Vec<(String, Value)>,
    chunks: Vec<ChunkReference<'a>>,
}

fn to_json(document: &impl Serialize) -> Value {
    serde_json::to_value(document).expect("metadata documents serialize to JSON")
}

impl<'a> DatasetDocuments<'a> {
    fn new(dataset: &'a VirtualDataset, options: &ReferenceOptions) -> Self {
        let separator = options.chunk_key_separator();
        let mut metadata = vec![
            (".zgroup".to_string(), to_json(&GroupMetadataV2::default())),
            (
                ".zattrs".to_string(),
                Value::Object(dataset.attributes().clone()),
            ),
        ];
        let mut chunks = Vec::new();
        for (name, variable) in dataset.variables() {
            let array = match variable.array() {
                VirtualArray::Manifest(array) => Cow::Borrowed(array),
                VirtualArray::Loaded(array) => Cow::Owned(array.to_manifest_array()),
            };
            let array_metadata = array
                .encoding()
                .to_array_metadata(array.shape().to_vec(), separator);
            metadata.push((format!("{name}/.zarray"), to_json(&array_metadata)));
            let mut attributes = variable.attributes().clone();
            attributes.insert(
                ARRAY_DIMENSIONS_KEY.to_string(),
                to_json(&variable.dimensions()),
            );
            if variable.array().as_loaded().is_some() {
                attributes.insert(LOADED_ARRAY_KEY.to_string(), Value::Bool(true));
            } else {
                attributes.remove(LOADED_ARRAY_KEY);
            }
            metadata.push((format!("{name}/.zattrs"), Value::Object(attributes)));
            chunks.extend(
                array
                    .manifest()
                    .present()
                    .map(|(coordinate, entry)| ChunkReference {
                        variable: name,
                        chunk_key: encode_chunk_key(&coordinate, separator),
                        entry: entry.clone(),
                    }),
            );
        }
        Self { metadata, chunks }
    }
}

/// The role of a reference key.
enum ReferenceKey<'a> {
    /// A `.zgroup`, `.zattrs`, or `.zarray` document.
    Metadata,
    /// A chunk of a variable.
    Chunk {
        variable: &'a str,
        chunk_key: &'a str,
    },
    Unrecognised,
}

impl<'a> ReferenceKey<'a> {
    fn classify(key: &'a str) -> Self {
        match key.split_once('/') {
            None if key == ".zgroup" || key == ".zattrs" => Self::Metadata,
            None => Self::Unrecognised,
            Some((variable, ".zarray" | ".zattrs")) if !variable.is_empty() => Self::Metadata,
            Some((variable, chunk_key))
                if variable.is_empty() || chunk_key.is_empty() || chunk_key.starts_with('.') =>
            {
                Self::Unrecognised
            }
            Some((variable, chunk_key)) => Self::Chunk {
                variable,
                chunk_key,
            },
        }
    }
}

fn invalid_metadata(key: &str, reason: impl ToString) -> MalformedReferenceError {
    MalformedReferenceError::InvalidMetadata {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_chunk(key: &str, reason: impl ToString) -> MalformedReferenceError {
    MalformedReferenceError::InvalidChunkReference {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Decode a `base64:` prefixed inline chunk.
///
/// Returns [`None`] if `value` is not `base64:` prefixed.
fn decode_inline_chunk(
    key: &str,
    value: &str,
) -> Option<Result<ChunkEntry, MalformedReferenceError>> {
    ChunkEntry::decode_inline(value).map(|decoded| {
        decoded
            .map(ChunkEntry::Inline)
            .map_err(|err| invalid_chunk(key, err))
    })
}

/// Metadata documents and chunk references gathered from references, before validation.
#[derive(Default)]
struct ReferenceParts {
    metadata: BTreeMap<String, Value>,
    chunks: BTreeMap<String, Vec<(String, ChunkEntry)>>,
}

impl ReferenceParts {
    /// Insert the reference `key`, parsing chunk references with `chunk`.
    fn insert(
        &mut self,
        key: &str,
        value: &Value,
        chunk: impl FnOnce() -> Result<ChunkEntry, MalformedReferenceError>,
    ) -> Result<(), MalformedReferenceError> {
        match ReferenceKey::classify(key) {
            ReferenceKey::Metadata => self.insert_metadata(key, value)?,
            ReferenceKey::Chunk {
                variable,
                chunk_key,
            } => self.insert_chunk(variable, chunk_key, chunk()?),
            ReferenceKey::Unrecognised => {
                log::warn!("skipping unrecognised reference key {key:?}");
            }
        }
        Ok(())
    }

    /// Insert a metadata document, held as either a JSON object or a JSON encoded string.
    fn insert_metadata(&mut self, key: &str, value: &Value) -> Result<(), MalformedReferenceError> {
        let document = match value {
            Value::String(encoded) => {
                serde_json::from_str(encoded).map_err(|err| invalid_metadata(key, err))?
            }
            Value::Object(_) => value.clone(),
            _ => {
                return Err(invalid_metadata(
                    key,
                    "expected a JSON object or a JSON encoded string",
                ))
            }
        };
        self.metadata.insert(key.to_string(), document);
        Ok(())
    }

    fn insert_chunk(&mut self, variable: &str, chunk_key: &str, entry: ChunkEntry) {
        self.chunks
            .entry(variable.to_string())
            .or_default()
            .push((chunk_key.to_string(), entry));
    }

    fn take_attributes(&mut self, key: &str) -> Result<Attributes, MalformedReferenceError> {
        match self.metadata.remove(key) {
            None => Ok(Attributes::new()),
            Some(Value::Object(attributes)) => Ok(attributes),
            Some(_) => Err(invalid_metadata(key, "expected a JSON object")),
        }
    }

    fn into_dataset(
        mut self,
        registry: &CodecRegistry,
    ) -> Result<VirtualDataset, MalformedReferenceError> {
        if let Some(group) = self.metadata.remove(".zgroup") {
            serde_json::from_value::<GroupMetadataV2>(group)
                .map_err(|err| invalid_metadata(".zgroup", err))?;
        }
        let attributes = self.take_attributes(".zattrs")?;

        let names: BTreeSet<String> = self
            .metadata
            .keys()
            .filter_map(|key| key.split_once('/').map(|(name, _)| name.to_string()))
            .chain(self.chunks.keys().cloned())
            .collect();
        let validate_codecs = global_config().validate_codecs();
        let mut variables = BTreeMap::new();
        for name in names {
            let zarray_key = format!("{name}/.zarray");
            let Some(zarray) = self.metadata.remove(&zarray_key) else {
                return Err(MalformedReferenceError::MissingArrayMetadata(name));
            };
            let array_metadata: ArrayMetadataV2 =
                serde_json::from_value(zarray).map_err(|err| invalid_metadata(&zarray_key, err))?;
            if validate_codecs {
                let unknown = array_metadata
                    .filters
                    .iter()
                    .flatten()
                    .chain(&array_metadata.compressor)
                    .find(|codec| !registry.supports(codec));
                if let Some(codec) = unknown {
                    return Err(MalformedReferenceError::UnknownCodec {
                        variable: name,
                        id: codec.id().to_string(),
                    });
                }
            }
            let chunks = self.chunks.remove(&name).unwrap_or_default();
            let array = read_array(&name, &array_metadata, chunks)?;

            let zattrs_key = format!("{name}/.zattrs");
            let mut variable_attributes = self.take_attributes(&zattrs_key)?;
            let dimensions = take_dimensions(&name, &mut variable_attributes)?;
            let array = match variable_attributes.remove(LOADED_ARRAY_KEY) {
                None | Some(Value::Bool(false)) => VirtualArray::Manifest(array),
                Some(Value::Bool(true)) => VirtualArray::Loaded(
                    LoadedArray::from_manifest_array(&array).ok_or_else(|| {
                        invalid_metadata(
                            &zattrs_key,
                            "a loaded array must be a single uncompressed inline chunk",
                        )
                    })?,
                ),
                Some(other) => {
                    return Err(invalid_metadata(
                        &zattrs_key,
                        format!("{LOADED_ARRAY_KEY} must be a boolean, got {other}"),
                    ))
                }
            };
            let variable = Variable::new(array, dimensions)
                .map_err(|err| MalformedReferenceError::InvalidDimensions {
                    variable: name.clone(),
                    reason: err.to_string(),
                })?
                .with_attributes(variable_attributes);
            variables.insert(name, variable);
        }
        Ok(VirtualDataset::from_parts(variables, attributes)?)
    }
}

fn read_array(
    name: &str,
    metadata: &ArrayMetadataV2,
    chunks: Vec<(String, ChunkEntry)>,
) -> Result<ManifestArray, MalformedReferenceError> {
    let invalid_geometry = |source| MalformedReferenceError::InvalidGeometry {
        variable: name.to_string(),
        source,
    };
    let grid_shape = zarrs_manifest_grid::grid_shape(&metadata.shape, &metadata.chunks);
    if metadata.shape.len() != metadata.chunks.len() {
        return Err(invalid_geometry(GeometryError::GridShape {
            shape: metadata.shape.clone(),
            chunk_shape: metadata.chunks.clone(),
            grid_shape,
        }));
    }
    let manifest = ChunkManifest::from_keys(grid_shape, metadata.dimension_separator, chunks)
        .map_err(|source| MalformedReferenceError::InvalidManifest {
            variable: name.to_string(),
            source,
        })?;
    ManifestArray::new(
        metadata.shape.clone(),
        ArrayEncoding::from_array_metadata(metadata),
        manifest,
    )
    .map_err(invalid_geometry)
}

fn take_dimensions(
    name: &str,
    attributes: &mut Attributes,
) -> Result<Vec<String>, MalformedReferenceError> {
    let invalid_dimensions = |reason: String| MalformedReferenceError::InvalidDimensions {
        variable: name.to_string(),
        reason,
    };
    match attributes.remove(ARRAY_DIMENSIONS_KEY) {
        None => Err(invalid_dimensions(format!(
            "missing {ARRAY_DIMENSIONS_KEY} attribute"
        ))),
        Some(Value::Array(names)) => names
            .into_iter()
            .map(|dimension| match dimension {
                Value::String(dimension) => Ok(dimension),
                other => Err(invalid_dimensions(format!(
                    "dimension name {other} is not a string"
                ))),
            })
            .collect(),
        Some(other) => Err(invalid_dimensions(format!(
            "{ARRAY_DIMENSIONS_KEY} must be an array of strings, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_key_classify() {
        assert!(matches!(
            ReferenceKey::classify(".zgroup"),
            ReferenceKey::Metadata
        ));
        assert!(matches!(
            ReferenceKey::classify("temp/.zarray"),
            ReferenceKey::Metadata
        ));
        assert!(matches!(
            ReferenceKey::classify("temp/.zattrs"),
            ReferenceKey::Metadata
        ));
        assert!(matches!(
            ReferenceKey::classify("temp/0.1.2"),
            ReferenceKey::Chunk {
                variable: "temp",
                chunk_key: "0.1.2"
            }
        ));
        assert!(matches!(
            ReferenceKey::classify("temp/0/1/2"),
            ReferenceKey::Chunk {
                variable: "temp",
                chunk_key: "0/1/2"
            }
        ));
        assert!(matches!(
            ReferenceKey::classify(".zmetadata"),
            ReferenceKey::Unrecognised
        ));
        assert!(matches!(
            ReferenceKey::classify("temp/.zgroup"),
            ReferenceKey::Unrecognised
        ));
        assert!(matches!(
            ReferenceKey::classify("/0"),
            ReferenceKey::Unrecognised
        ));
    }

    #[test]
    fn reference_dimensions() {
        let mut attributes = serde_json::json!({"units": "K", "_ARRAY_DIMENSIONS": ["time", "x"]})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(
            take_dimensions("a", &mut attributes).unwrap(),
            vec!["time", "x"]
        );
        assert_eq!(attributes.len(), 1);
        assert!(matches!(
            take_dimensions("a", &mut attributes),
            Err(MalformedReferenceError::InvalidDimensions { .. })
        ));
        attributes.insert(ARRAY_DIMENSIONS_KEY.to_string(), serde_json::json!([1]));
        assert!(take_dimensions("a", &mut attributes).is_err());
    }
}
