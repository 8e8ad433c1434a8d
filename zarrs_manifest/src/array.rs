//! Virtual arrays.
//!
//! A [`ManifestArray`] references the chunks of source files through a [`ChunkManifest`](crate::ChunkManifest).
//! A [`LoadedArray`] holds a small array in memory.
//! A [`VirtualArray`] is either of these, and is the array of a dataset [`Variable`](crate::Variable).

mod loaded_array;
mod manifest_array;
mod operation;
mod virtual_array;

pub use loaded_array::LoadedArray;
pub use manifest_array::ManifestArray;
pub use operation::ElementwiseOperation;
pub use virtual_array::VirtualArray;
