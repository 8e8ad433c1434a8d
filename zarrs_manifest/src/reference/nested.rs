use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{decode_inline_chunk, invalid_chunk, DatasetDocuments, ReferenceParts};
use crate::{ChunkEntry, MalformedReferenceError};

/// The supported version of nested references.
const VERSION: u64 = 1;

/// Nested references.
///
/// A kerchunk version 1 document:
/// ```json
/// {
///     "version": 1,
///     "templates": {"u0": "s3://bucket/data.nc"},
///     "refs": {
///         ".zgroup": "{\"zarr_format\":2}",
///         "temp/.zarray": "{...}",
///         "temp/0.0": ["{{u0}}", 1024, 4096],
///         "temp/0.1": "base64:AAAA"
///     }
/// }
/// ```
/// Metadata documents are JSON encoded strings.
/// A chunk is either `[path, offset, length]` or inline data.
/// Inline data is `base64:` prefixed, or otherwise taken as the raw bytes of the string.
/// `{{name}}` in a path is replaced by the template `name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NestedReferences {
    version: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    templates: BTreeMap<String, String>,
    refs: Map<String, Value>,
}

impl NestedReferences {
    /// Create nested references from `refs`.
    #[must_use]
    pub fn new(refs: Map<String, Value>) -> Self {
        Self {
            version: VERSION,
            templates: BTreeMap::new(),
            refs,
        }
    }

    /// Set the path templates.
    #[must_use]
    pub fn with_templates(mut self, templates: BTreeMap<String, String>) -> Self {
        self.templates = templates;
        self
    }

    /// Return the reference format version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Return the path templates.
    #[must_use]
    pub fn templates(&self) -> &BTreeMap<String, String> {
        &self.templates
    }

    /// Return the references.
    #[must_use]
    pub fn refs(&self) -> &Map<String, Value> {
        &self.refs
    }

    /// Serialize to a JSON string.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("references serialize to JSON")
    }

    /// Serialize to a pretty printed JSON string.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn to_json_string_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("references serialize to JSON")
    }

    /// Parse nested references from a JSON string.
    ///
    /// # Errors
    /// Returns a [`MalformedReferenceError`] if `json` is not valid JSON or not a version 1 reference document.
    pub fn from_json_str(json: &str) -> Result<Self, MalformedReferenceError> {
        Self::from_json_value(serde_json::from_str(json)?)
    }

    /// Parse nested references from a JSON value.
    ///
    /// A `gen` section and unrecognised top-level fields are skipped with a warning.
    ///
    /// # Errors
    /// Returns a [`MalformedReferenceError`] if `value` is not a version 1 reference document.
    pub fn from_json_value(value: Value) -> Result<Self, MalformedReferenceError> {
        let Value::Object(mut document) = value else {
            return Err(MalformedReferenceError::InvalidDocument(
                "expected a JSON object".to_string(),
            ));
        };
        let version = document.remove("version").unwrap_or(Value::Null);
        if version.as_u64() != Some(VERSION) {
            return Err(MalformedReferenceError::UnsupportedVersion(version));
        }
        let templates = match document.remove("templates") {
            None => BTreeMap::new(),
            Some(Value::Object(templates)) => templates
                .into_iter()
                .map(|(name, value)| match value {
                    Value::String(value) => Ok((name, value)),
                    _ => Err(MalformedReferenceError::InvalidDocument(format!(
                        "template {name:?} is not a string"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(MalformedReferenceError::InvalidDocument(
                    "\"templates\" is not an object".to_string(),
                ))
            }
        };
        let Some(Value::Object(refs)) = document.remove("refs") else {
            return Err(MalformedReferenceError::InvalidDocument(
                "missing \"refs\" object".to_string(),
            ));
        };
        if document.remove("gen").is_some() {
            log::warn!("skipping generated references, \"gen\" is not supported");
        }
        for key in document.keys() {
            log::warn!("skipping unrecognised reference document field {key:?}");
        }
        Ok(Self {
            version: VERSION,
            templates,
            refs,
        })
    }

    pub(super) fn from_documents(documents: DatasetDocuments<'_>, path_templates: bool) -> Self {
        let mut refs = Map::with_capacity(documents.metadata.len() + documents.chunks.len());
        for (key, document) in documents.metadata {
            refs.insert(key, Value::String(document.to_string()));
        }

        let mut templates = BTreeMap::new();
        let mut template_names: HashMap<&str, String> = HashMap::new();
        if path_templates {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for chunk in &documents.chunks {
                if let Some(path) = chunk.entry.path() {
                    *counts.entry(path).or_default() += 1;
                }
            }
            for chunk in &documents.chunks {
                let Some(path) = chunk.entry.path() else {
                    continue;
                };
                if counts[path] > 1 && !template_names.contains_key(path) {
                    let name = format!("u{}", templates.len());
                    templates.insert(name.clone(), path.to_string());
                    template_names.insert(path, format!("{{{{{name}}}}}"));
                }
            }
        }

        for chunk in &documents.chunks {
            let value = match &chunk.entry {
                ChunkEntry::Reference {
                    path,
                    offset,
                    length,
                } => {
                    let path: &str = path;
                    let path = template_names.get(path).map_or(path, String::as_str);
                    serde_json::json!([path, offset, length])
                }
                ChunkEntry::Inline(data) => Value::String(ChunkEntry::encode_inline(data)),
            };
            refs.insert(format!("{}/{}", chunk.variable, chunk.chunk_key), value);
        }
        Self::new(refs).with_templates(templates)
    }

    pub(super) fn to_parts(&self) -> Result<ReferenceParts, MalformedReferenceError> {
        let mut parts = ReferenceParts::default();
        for (key, value) in &self.refs {
            parts.insert(key, value, || self.parse_chunk(key, value))?;
        }
        Ok(parts)
    }

    fn parse_chunk(&self, key: &str, value: &Value) -> Result<ChunkEntry, MalformedReferenceError> {
        match value {
            Value::String(data) => decode_inline_chunk(key, data).unwrap_or_else(|| {
                Ok(ChunkEntry::new_inline(Bytes::copy_from_slice(
                    data.as_bytes(),
                )))
            }),
            Value::Array(items) => match items.as_slice() {
                [Value::String(path), offset, length] => {
                    let (Some(offset), Some(length)) = (offset.as_u64(), length.as_u64()) else {
                        return Err(invalid_chunk(
                            key,
                            "offset and length must be unsigned integers",
                        ));
                    };
                    Ok(ChunkEntry::new(self.expand_templates(path), offset, length))
                }
                [Value::String(_)] => Err(invalid_chunk(
                    key,
                    "whole file references are not supported",
                )),
                _ => Err(invalid_chunk(key, "expected [path, offset, length]")),
            },
            _ => Err(invalid_chunk(
                key,
                "expected inline data or [path, offset, length]",
            )),
        }
    }

    fn expand_templates(&self, path: &str) -> String {
        self.templates
            .iter()
            .fold(path.to_string(), |path, (name, value)| {
                path.replace(&format!("{{{{{name}}}}}"), value)
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn references(value: Value) -> NestedReferences {
        NestedReferences::from_json_value(value).unwrap()
    }

    #[test]
    fn nested_references_version() {
        assert!(NestedReferences::from_json_str(r#"{"version": 1, "refs": {}}"#).is_ok());
        assert_eq!(
            NestedReferences::from_json_str(r#"{"version": 2, "refs": {}}"#),
            Err(MalformedReferenceError::UnsupportedVersion(json!(2)))
        );
        assert_eq!(
            NestedReferences::from_json_str(r#"{"refs": {}}"#),
            Err(MalformedReferenceError::UnsupportedVersion(Value::Null))
        );
        assert!(matches!(
            NestedReferences::from_json_str(r#"{"version": 1}"#),
            Err(MalformedReferenceError::InvalidDocument(_))
        ));
        assert!(matches!(
            NestedReferences::from_json_str("[1, 2]"),
            Err(MalformedReferenceError::InvalidDocument(_))
        ));
        assert!(matches!(
            NestedReferences::from_json_str("{"),
            Err(MalformedReferenceError::InvalidDocument(_))
        ));
    }

    #[test]
    fn nested_references_parse_chunk() {
        let refs = references(json!({
            "version": 1,
            "templates": {"u": "s3://bucket"},
            "refs": {}
        }));
        assert_eq!(
            refs.parse_chunk("a/0", &json!(["{{u}}/data.nc", 10, 20])),
            Ok(ChunkEntry::new("s3://bucket/data.nc", 10, 20))
        );
        assert_eq!(
            refs.parse_chunk("a/0", &json!("base64:AQID")),
            Ok(ChunkEntry::new_inline(vec![1u8, 2, 3]))
        );
        assert_eq!(
            refs.parse_chunk("a/0", &json!("abc")),
            Ok(ChunkEntry::new_inline(b"abc".to_vec()))
        );
        for invalid in [
            json!(["data.nc"]),
            json!(["data.nc", -1, 20]),
            json!(["data.nc", 0]),
            json!([1, 2, 3]),
            json!(42),
            json!("base64:!!"),
        ] {
            assert!(matches!(
                refs.parse_chunk("a/0", &invalid),
                Err(MalformedReferenceError::InvalidChunkReference { .. })
            ));
        }
    }

    #[test]
    fn nested_references_skipped_fields() {
        testing_logger::setup();
        let refs = references(json!({
            "version": 1,
            "refs": {},
            "gen": [],
            "extra": 1
        }));
        assert!(refs.refs().is_empty());
        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 2);
            assert!(captured_logs[0].body.contains("gen"));
            assert!(captured_logs[1].body.contains("extra"));
            assert_eq!(captured_logs[1].level, log::Level::Warn);
        });
    }

    #[test]
    fn nested_references_json() {
        let refs = references(json!({
            "version": 1,
            "refs": {"a/0": ["data.nc", 0, 8]}
        }));
        assert_eq!(
            refs.to_json_string(),
            r#"{"version":1,"refs":{"a/0":["data.nc",0,8]}}"#
        );
        assert_eq!(
            NestedReferences::from_json_str(&refs.to_json_string_pretty()).unwrap(),
            refs
        );
    }
}
