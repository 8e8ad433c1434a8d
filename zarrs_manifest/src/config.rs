//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use zarrs_manifest_metadata::ChunkKeySeparator;

use crate::ConflictPolicy;

/// Global configuration options for virtual datasets.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Chunk Key Separator
/// > default: [`ChunkKeySeparator::Dot`]
///
/// The default separator of chunk key components in generated references (the `dimension_separator` of `.zarray`).
/// Overridden per call by [`ReferenceOptions`](crate::reference::ReferenceOptions).
///
/// ## Conflict Policy
/// > default: [`ConflictPolicy::Fail`]
///
/// How a variable defined differently by datasets being merged or concatenated is handled when no policy is given explicitly.
///
/// ## Validate Codecs
/// > default: [`true`]
///
/// If true, reading references fails for any codec not in the supplied [`CodecRegistry`](crate::CodecRegistry).
#[derive(Debug)]
pub struct Config {
    chunk_key_separator: ChunkKeySeparator,
    conflict_policy: ConflictPolicy,
    validate_codecs: bool,
}

#[allow(clippy::derivable_impls)]
impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_key_separator: ChunkKeySeparator::Dot,
            conflict_policy: ConflictPolicy::Fail,
            validate_codecs: true,
        }
    }
}

impl Config {
    /// Get the [chunk key separator](#chunk-key-separator) configuration.
    #[must_use]
    pub fn chunk_key_separator(&self) -> ChunkKeySeparator {
        self.chunk_key_separator
    }

    /// Set the [chunk key separator](#chunk-key-separator) configuration.
    pub fn set_chunk_key_separator(&mut self, chunk_key_separator: ChunkKeySeparator) {
        self.chunk_key_separator = chunk_key_separator;
    }

    /// Get the [conflict policy](#conflict-policy) configuration.
    #[must_use]
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    /// Set the [conflict policy](#conflict-policy) configuration.
    pub fn set_conflict_policy(&mut self, conflict_policy: ConflictPolicy) {
        self.conflict_policy = conflict_policy;
    }

    /// Get the [validate codecs](#validate-codecs) configuration.
    #[must_use]
    pub fn validate_codecs(&self) -> bool {
        self.validate_codecs
    }

    /// Set the [validate codecs](#validate-codecs) configuration.
    pub fn set_validate_codecs(&mut self, validate_codecs: bool) {
        self.validate_codecs = validate_codecs;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validate_codecs() {
        assert!(global_config().validate_codecs());
        global_config_mut().set_validate_codecs(false);
        assert!(!global_config().validate_codecs());
        global_config_mut().set_validate_codecs(true);
    }

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_key_separator(), ChunkKeySeparator::Dot);
        assert_eq!(config.conflict_policy(), ConflictPolicy::Fail);
    }
}
