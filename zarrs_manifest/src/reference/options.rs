use zarrs_manifest_metadata::ChunkKeySeparator;

use crate::config::global_config;

/// Options for writing references.
///
/// The default values are:
/// - `chunk_key_separator`: the [chunk key separator](crate::config::Config#chunk-key-separator) of the global configuration
/// - `path_templates`: `false`
#[derive(Debug, Clone, Copy)]
pub struct ReferenceOptions {
    chunk_key_separator: ChunkKeySeparator,
    path_templates: bool,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            chunk_key_separator: global_config().chunk_key_separator(),
            path_templates: false,
        }
    }
}

impl ReferenceOptions {
    /// Return the chunk key separator.
    #[must_use]
    pub fn chunk_key_separator(&self) -> ChunkKeySeparator {
        self.chunk_key_separator
    }

    /// Set the separator of chunk key components.
    pub fn set_chunk_key_separator(&mut self, chunk_key_separator: ChunkKeySeparator) -> &mut Self {
        self.chunk_key_separator = chunk_key_separator;
        self
    }

    /// Set the separator of chunk key components.
    #[must_use]
    pub fn with_chunk_key_separator(mut self, chunk_key_separator: ChunkKeySeparator) -> Self {
        self.chunk_key_separator = chunk_key_separator;
        self
    }

    /// Return the path templates setting.
    #[must_use]
    pub fn path_templates(&self) -> bool {
        self.path_templates
    }

    /// Set whether or not nested references shorten repeated source paths with `{{name}}` templates.
    pub fn set_path_templates(&mut self, path_templates: bool) -> &mut Self {
        self.path_templates = path_templates;
        self
    }

    /// Set whether or not nested references shorten repeated source paths with `{{name}}` templates.
    #[must_use]
    pub fn with_path_templates(mut self, path_templates: bool) -> Self {
        self.path_templates = path_templates;
        self
    }
}
