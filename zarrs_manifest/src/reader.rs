//! The source reader interface.
//!
//! Parsing archival file formats into chunk manifests is the job of a [`VirtualReader`].
//! Sources are independent, so [`read_sources`] reads them in parallel.
//! Reader failures are returned unchanged and never retried.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::global_config;
use crate::{ManifestError, SourceReadError, VirtualDataset};

/// Reads the chunk layout of a source file into a [`VirtualDataset`].
pub trait VirtualReader: Send + Sync {
    /// Read the source `source`.
    ///
    /// # Errors
    /// Returns a [`SourceReadError`] identifying `source` if it cannot be read.
    fn read(&self, source: &str) -> Result<VirtualDataset, SourceReadError>;
}

impl<F> VirtualReader for F
where
    F: Fn(&str) -> Result<VirtualDataset, SourceReadError> + Send + Sync,
{
    fn read(&self, source: &str) -> Result<VirtualDataset, SourceReadError> {
        self(source)
    }
}

/// Read `sources` in parallel.
///
/// The datasets are returned in the order of `sources`.
///
/// # Errors
/// Returns the [`SourceReadError`] of a source that could not be read.
pub fn read_sources<S: AsRef<str> + Sync>(
    reader: &dyn VirtualReader,
    sources: &[S],
) -> Result<Vec<VirtualDataset>, SourceReadError> {
    let datasets = sources
        .par_iter()
        .map(|source| reader.read(source.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("read {} sources", datasets.len());
    Ok(datasets)
}

/// Read `sources` in parallel and concatenate them along the dimension `dimension`.
///
/// Uses the [conflict policy](crate::config::Config#conflict-policy) of the global configuration.
///
/// # Errors
/// Returns a [`ManifestError`] if a source cannot be read or the datasets cannot be concatenated.
pub fn read_concat<S: AsRef<str> + Sync>(
    reader: &dyn VirtualReader,
    sources: &[S],
    dimension: &str,
) -> Result<VirtualDataset, ManifestError> {
    let datasets = read_sources(reader, sources)?;
    let policy = global_config().conflict_policy();
    VirtualDataset::concat(&datasets, dimension, policy)
}

/// Read `sources` in parallel and merge them.
///
/// Uses the [conflict policy](crate::config::Config#conflict-policy) of the global configuration.
///
/// # Errors
/// Returns a [`ManifestError`] if a source cannot be read or the datasets cannot be merged.
pub fn read_merge<S: AsRef<str> + Sync>(
    reader: &dyn VirtualReader,
    sources: &[S],
) -> Result<VirtualDataset, ManifestError> {
    let datasets = read_sources(reader, sources)?;
    let policy = global_config().conflict_policy();
    VirtualDataset::merge(&datasets, policy)
}
