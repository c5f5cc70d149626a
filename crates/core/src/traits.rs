//! The seam between the catalog and the array data engine
//!
//! The catalog does not read or write cells. Tile I/O, attribute
//! synchronisation, and fragment production belong to an engine the
//! caller supplies as an implementation of [`ArrayEngine`]. The
//! catalog owns the lifetime of every handle the engine hands out
//! (arrays, iterators, bookkeeping) but never looks inside them.
//!
//! ## Fragment staging contract
//!
//! Engines must stage in-progress fragments under a dot-prefixed
//! scratch directory and only rename them to their final
//! `__<unique>_<timestamp>` name when the fragment sentinel is
//! written. The catalog's garbage sweep relies on this: a `__*`
//! directory without a sentinel is always dead.

use crate::error::CatalogResult;
use crate::schema::ArraySchema;
use crate::types::ArrayMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything the engine needs to construct an array object.
///
/// Read-mode requests carry the registry's cached fragment list and
/// bookkeeping; write-mode requests carry empty lists.
#[derive(Debug)]
pub struct ArrayOpenRequest<B> {
    /// Schema the object was opened with.
    pub schema: Arc<ArraySchema>,
    /// Fragments visible to this open, in timestamp order.
    pub fragment_names: Vec<PathBuf>,
    /// Per-fragment bookkeeping, aligned 1:1 with `fragment_names`.
    pub book_keeping: Vec<Arc<B>>,
    /// Open mode.
    pub mode: ArrayMode,
    /// Optional subarray restriction, opaque to the catalog.
    pub subarray: Option<Vec<u8>>,
    /// Attributes to open; empty means all.
    pub attributes: Vec<String>,
}

// Bookkeeping travels behind `Arc`, so cloning a request never needs
// `B: Clone` (which a derive would demand).
impl<B> Clone for ArrayOpenRequest<B> {
    fn clone(&self) -> Self {
        ArrayOpenRequest {
            schema: Arc::clone(&self.schema),
            fragment_names: self.fragment_names.clone(),
            book_keeping: self.book_keeping.clone(),
            mode: self.mode,
            subarray: self.subarray.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Outcome of an engine consolidation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationPlan {
    /// Final path of the fragment the engine produced. The fragment
    /// stays invisible (no sentinel) until `fragment_finalize`.
    pub new_fragment: PathBuf,
    /// Fragments the new one supersedes. Empty means there was
    /// nothing to consolidate.
    pub old_fragments: Vec<PathBuf>,
}

/// The array data engine, as seen by the catalog.
pub trait ArrayEngine: Send + Sync + 'static {
    /// Engine-side array object.
    type Array: Send;
    /// Engine-side cell iterator.
    type Iter: Send;
    /// Opaque per-fragment bookkeeping (tile extents, MBRs, offsets).
    type BookKeeping: Send + Sync;

    /// Load the bookkeeping of one fragment.
    ///
    /// Called once per fragment on the first open of an object; the
    /// catalog caches and shares the result across openers.
    fn load_book_keeping(
        &self,
        schema: &ArraySchema,
        fragment_dir: &Path,
        mode: ArrayMode,
    ) -> CatalogResult<Self::BookKeeping>;

    /// Construct an array object.
    ///
    /// `clone` carries the double-buffering companion: the catalog
    /// builds a bare clone first, then the primary object holding it.
    fn array_init(
        &self,
        request: ArrayOpenRequest<Self::BookKeeping>,
        clone: Option<Box<Self::Array>>,
    ) -> CatalogResult<Self::Array>;

    /// Tear down an array object. Write-mode arrays flush their
    /// fragment here.
    fn array_finalize(&self, array: Self::Array) -> CatalogResult<()>;

    /// Flush all written data of a write-mode array to disk.
    fn array_sync(&self, array: &mut Self::Array) -> CatalogResult<()>;

    /// Flush one attribute of a write-mode array to disk.
    fn array_sync_attribute(
        &self,
        array: &mut Self::Array,
        attribute: &str,
    ) -> CatalogResult<()>;

    /// Merge the array's fragments into one new fragment.
    ///
    /// Writes the merged cells into a scratch directory under the
    /// array and reports the fragments it replaces. Must not write
    /// the fragment sentinel; visibility is flipped later, under the
    /// exclusive filelock, via [`ArrayEngine::fragment_finalize`].
    fn consolidate(&self, array: &mut Self::Array) -> CatalogResult<ConsolidationPlan>;

    /// Make a consolidated fragment visible: move the scratch
    /// directory to `fragment_dir` and write the fragment sentinel.
    fn fragment_finalize(&self, fragment_dir: &Path) -> CatalogResult<()>;

    /// Build a cell iterator over an open array, consuming it.
    fn iterator_init(&self, array: Self::Array) -> CatalogResult<Self::Iter>;

    /// Tear down a cell iterator and its underlying array.
    fn iterator_finalize(&self, iter: Self::Iter) -> CatalogResult<()>;
}
