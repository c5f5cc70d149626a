//! Client-side handles
//!
//! A handle pairs an engine object with the canonical path and mode it
//! was opened under. The path is what ties the handle back to its
//! registry entry on close; handles deliberately carry no pointer into
//! the registry (lookup by path preserves the refcount discipline).

use std::path::{Path, PathBuf};
use tilestore_core::{ArrayEngine, ArrayMode};

/// An open array.
pub struct ArrayHandle<E: ArrayEngine> {
    pub(crate) array: E::Array,
    pub(crate) dir: PathBuf,
    pub(crate) mode: ArrayMode,
}

impl<E: ArrayEngine> std::fmt::Debug for ArrayHandle<E>
where
    E::Array: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayHandle")
            .field("array", &self.array)
            .field("dir", &self.dir)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<E: ArrayEngine> ArrayHandle<E> {
    /// Canonical path of the array.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Mode the array was opened in.
    pub fn mode(&self) -> ArrayMode {
        self.mode
    }

    /// The engine-side array object.
    pub fn engine_array(&self) -> &E::Array {
        &self.array
    }

    /// Mutable access to the engine-side array object.
    pub fn engine_array_mut(&mut self) -> &mut E::Array {
        &mut self.array
    }
}

/// An open metadata (key-value array) object.
///
/// Metadata is implemented over the same engine array machinery; the
/// distinct handle type keeps the two lifecycles from being mixed up.
pub struct MetadataHandle<E: ArrayEngine> {
    pub(crate) array: E::Array,
    pub(crate) dir: PathBuf,
    pub(crate) mode: ArrayMode,
}

impl<E: ArrayEngine> MetadataHandle<E> {
    /// Canonical path of the metadata object.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Mode the metadata was opened in.
    pub fn mode(&self) -> ArrayMode {
        self.mode
    }

    /// The engine-side array object backing this metadata.
    pub fn engine_array(&self) -> &E::Array {
        &self.array
    }

    /// Mutable access to the backing engine array.
    pub fn engine_array_mut(&mut self) -> &mut E::Array {
        &mut self.array
    }
}

/// A cell iterator over an open array.
pub struct ArrayIterator<E: ArrayEngine> {
    pub(crate) iter: E::Iter,
    pub(crate) dir: PathBuf,
    pub(crate) mode: ArrayMode,
}

impl<E: ArrayEngine> ArrayIterator<E> {
    /// Canonical path of the iterated array.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// The engine-side iterator.
    pub fn engine_iter(&self) -> &E::Iter {
        &self.iter
    }

    /// Mutable access to the engine-side iterator.
    pub fn engine_iter_mut(&mut self) -> &mut E::Iter {
        &mut self.iter
    }
}

/// A cell iterator over an open metadata object.
pub struct MetadataIterator<E: ArrayEngine> {
    pub(crate) iter: E::Iter,
    pub(crate) dir: PathBuf,
    pub(crate) mode: ArrayMode,
}

impl<E: ArrayEngine> MetadataIterator<E> {
    /// Canonical path of the iterated metadata object.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// The engine-side iterator.
    pub fn engine_iter(&self) -> &E::Iter {
        &self.iter
    }

    /// Mutable access to the engine-side iterator.
    pub fn engine_iter_mut(&mut self) -> &mut E::Iter {
        &mut self.iter
    }
}
