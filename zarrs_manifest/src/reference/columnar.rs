use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{decode_inline_chunk, DatasetDocuments, ReferenceParts};
use crate::{ChunkEntry, MalformedReferenceError, INLINE_PREFIX};

/// The prefix of an escaped source path in the `path` column.
///
/// Source paths starting with `base64:` or with this prefix are written with this prefix, so they are not read as inline data.
pub const ESCAPED_PATH_PREFIX: &str = "path:";

fn escape_path(path: &str) -> Cow<'_, str> {
    if path.starts_with(INLINE_PREFIX) || path.starts_with(ESCAPED_PATH_PREFIX) {
        Cow::Owned(format!("{ESCAPED_PATH_PREFIX}{path}"))
    } else {
        Cow::Borrowed(path)
    }
}

/// A row of a [`ReferenceTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceRow<'a> {
    /// The variable name.
    pub variable: &'a str,
    /// The chunk key, e.g. `0.2.1`.
    pub coordinate_key: &'a str,
    /// The source path, or `base64:` prefixed inline data.
    ///
    /// A source path starting with `base64:` or [`ESCAPED_PATH_PREFIX`] is escaped with [`ESCAPED_PATH_PREFIX`].
    pub path: &'a str,
    /// The byte offset, zero for inline data.
    pub offset: u64,
    /// The byte length.
    pub length: u64,
}

/// A columnar reference table.
///
/// Each chunk reference is one row of the `variable`, `coordinate_key`, `path`, `offset`, and `length` columns.
/// The metadata documents are held alongside, keyed as in [`NestedReferences`](super::NestedReferences).
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceTable {
    metadata: Map<String, Value>,
    variable: Vec<String>,
    coordinate_key: Vec<String>,
    path: Vec<String>,
    offset: Vec<u64>,
    length: Vec<u64>,
}

impl ReferenceTable {
    /// Create a reference table with `metadata` and no rows.
    #[must_use]
    pub fn new(metadata: Map<String, Value>) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Create a reference table from columns.
    ///
    /// # Errors
    /// Returns [`MalformedReferenceError::InvalidColumns`] if the columns differ in length.
    pub fn from_columns(
        metadata: Map<String, Value>,
        variable: Vec<String>,
        coordinate_key: Vec<String>,
        path: Vec<String>,
        offset: Vec<u64>,
        length: Vec<u64>,
    ) -> Result<Self, MalformedReferenceError> {
        let table = Self {
            metadata,
            variable,
            coordinate_key,
            path,
            offset,
            length,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), MalformedReferenceError> {
        let expected = self.variable.len();
        for (column, got) in [
            ("coordinate_key", self.coordinate_key.len()),
            ("path", self.path.len()),
            ("offset", self.offset.len()),
            ("length", self.length.len()),
        ] {
            if got != expected {
                return Err(MalformedReferenceError::InvalidColumns {
                    column,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }

    /// Append a row.
    pub fn push_row(&mut self, row: ReferenceRow<'_>) {
        self.variable.push(row.variable.to_string());
        self.coordinate_key.push(row.coordinate_key.to_string());
        self.path.push(row.path.to_string());
        self.offset.push(row.offset);
        self.length.push(row.length);
    }

    /// Return the metadata documents.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Return the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variable.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variable.is_empty()
    }

    /// Return an iterator over the rows.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = ReferenceRow<'_>> {
        (0..self.len()).map(|i| ReferenceRow {
            variable: &self.variable[i],
            coordinate_key: &self.coordinate_key[i],
            path: &self.path[i],
            offset: self.offset[i],
            length: self.length[i],
        })
    }

    /// Return the `variable` column.
    #[must_use]
    pub fn variable_column(&self) -> &[String] {
        &self.variable
    }

    /// Return the `coordinate_key` column.
    #[must_use]
    pub fn coordinate_key_column(&self) -> &[String] {
        &self.coordinate_key
    }

    /// Return the `path` column.
    #[must_use]
    pub fn path_column(&self) -> &[String] {
        &self.path
    }

    /// Return the `offset` column.
    #[must_use]
    pub fn offset_column(&self) -> &[u64] {
        &self.offset
    }

    /// Return the `length` column.
    #[must_use]
    pub fn length_column(&self) -> &[u64] {
        &self.length
    }

    /// Serialize to a JSON string.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).expect("reference tables serialize to JSON")
    }

    /// Parse a reference table from a JSON string.
    ///
    /// # Errors
    /// Returns a [`MalformedReferenceError`] if `json` is not a valid reference table.
    pub fn from_json_str(json: &str) -> Result<Self, MalformedReferenceError> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub(super) fn from_documents(documents: DatasetDocuments<'_>) -> Self {
        let mut table = Self::new(documents.metadata.into_iter().collect());
        for chunk in &documents.chunks {
            let path = match &chunk.entry {
                ChunkEntry::Reference { path, .. } => escape_path(path),
                ChunkEntry::Inline(data) => Cow::Owned(ChunkEntry::encode_inline(data)),
            };
            table.push_row(ReferenceRow {
                variable: chunk.variable,
                coordinate_key: &chunk.chunk_key,
                path: &path,
                offset: chunk.entry.offset(),
                length: chunk.entry.length(),
            });
        }
        table
    }

    pub(super) fn to_parts(&self) -> Result<ReferenceParts, MalformedReferenceError> {
        self.validate()?;
        let mut parts = ReferenceParts::default();
        for (key, value) in &self.metadata {
            parts.insert(key, value, || {
                Err(MalformedReferenceError::InvalidMetadata {
                    key: key.clone(),
                    reason: "chunk references must be table rows".to_string(),
                })
            })?;
        }
        for row in self.rows() {
            let key = format!("{}/{}", row.variable, row.coordinate_key);
            let entry = if let Some(path) = row.path.strip_prefix(ESCAPED_PATH_PREFIX) {
                ChunkEntry::new(path, row.offset, row.length)
            } else {
                decode_inline_chunk(&key, row.path)
                    .unwrap_or_else(|| Ok(ChunkEntry::new(row.path, row.offset, row.length)))?
            };
            parts.insert_chunk(row.variable, row.coordinate_key, entry);
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table_columns() {
        let mut table = ReferenceTable::new(Map::new());
        assert!(table.is_empty());
        table.push_row(ReferenceRow {
            variable: "temp",
            coordinate_key: "0.0",
            path: "data.nc",
            offset: 100,
            length: 50,
        });
        assert_eq!(table.len(), 1);
        assert_eq!(table.path_column(), &["data.nc".to_string()]);
        assert_eq!(
            table.rows().next(),
            Some(ReferenceRow {
                variable: "temp",
                coordinate_key: "0.0",
                path: "data.nc",
                offset: 100,
                length: 50,
            })
        );
        assert_eq!(
            ReferenceTable::from_json_str(&table.to_json_string()).unwrap(),
            table
        );
    }

    #[test]
    fn escaped_paths() {
        assert_eq!(escape_path("data.nc"), "data.nc");
        assert_eq!(escape_path("base64:AAAA"), "path:base64:AAAA");
        assert_eq!(escape_path("path:data.nc"), "path:path:data.nc");
        assert_eq!(escape_path("s3://bucket/path:1"), "s3://bucket/path:1");
    }

    #[test]
    fn reference_table_invalid_columns() {
        assert_eq!(
            ReferenceTable::from_columns(
                Map::new(),
                vec!["a".to_string()],
                vec!["0".to_string()],
                vec!["data.nc".to_string()],
                vec![0, 10],
                vec![10],
            ),
            Err(MalformedReferenceError::InvalidColumns {
                column: "offset",
                expected: 1,
                got: 2
            })
        );
        assert!(matches!(
            ReferenceTable::from_json_str(
                r#"{"metadata": {}, "variable": ["a"], "coordinate_key": [], "path": [], "offset": [], "length": []}"#
            ),
            Err(MalformedReferenceError::InvalidColumns {
                column: "coordinate_key",
                ..
            })
        ));
        assert!(matches!(
            ReferenceTable::from_json_str(r#"{"metadata": {}}"#),
            Err(MalformedReferenceError::InvalidDocument(_))
        ));
    }
}
