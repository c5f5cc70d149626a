//! Open and close paths for arrays and metadata
//!
//! Read-mode opens go through the open-array registry: the first
//! opener acquires the shared consolidation filelock, enumerates and
//! sorts the fragments, loads the schema, and loads one bookkeeping
//! record per fragment; later openers reuse the cached load and only
//! bump the refcount. Write-mode opens bypass the registry entirely
//! and see no fragments.
//!
//! Lock discipline: the shared filelock may block on a cross-process
//! consolidator, so it is always acquired with no entry mutex held;
//! the entry mutex is then retaken and the initialisation re-checked.

use crate::handle::{ArrayHandle, ArrayIterator, MetadataHandle, MetadataIterator};
use crate::manager::StorageManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tilestore_core::{
    ArrayEngine, ArrayMode, ArrayOpenRequest, ArraySchema, CatalogError, CatalogResult,
    ObjectKind,
};
use tilestore_storage::{filelock, fragment, probe, schema_io};
use tracing::{debug, warn};

/// Cached load of one open object, cloned out of its registry entry.
pub(crate) struct OpenContents<B> {
    pub schema: Arc<ArraySchema>,
    pub fragment_names: Vec<PathBuf>,
    pub book_keeping: Vec<Arc<B>>,
}

impl<E: ArrayEngine> StorageManager<E> {
    // ========================================================================
    // Array open/close
    // ========================================================================

    /// Open the array at `array_dir`.
    ///
    /// Read modes enter the registry and pin the fragment set for the
    /// lifetime of the handle; write modes do not. The engine object
    /// is built twice: a bare clone first, then the primary holding
    /// the clone for double-buffered reads.
    pub fn array_init(
        &self,
        array_dir: impl AsRef<Path>,
        mode: ArrayMode,
        subarray: Option<&[u8]>,
        attributes: &[String],
    ) -> CatalogResult<ArrayHandle<E>> {
        let dir = self.canonical(array_dir.as_ref())?;
        if !probe::is_array(&dir) {
            return Err(CatalogError::not_found(dir, "array"));
        }

        let contents = self.open_contents(&dir, ObjectKind::Array, mode)?;
        let array = self.build_engine_array(&dir, mode, subarray, attributes, contents)?;
        debug!(target: "tilestore::open", path = %dir.display(), mode = ?mode, "opened array");
        Ok(ArrayHandle { array, dir, mode })
    }

    /// Close an array handle.
    ///
    /// Finalises the engine object and, for read handles, drops the
    /// registry reference. Both always run; the first error wins.
    pub fn array_finalize(&self, handle: ArrayHandle<E>) -> CatalogResult<()> {
        let ArrayHandle { array, dir, mode } = handle;
        let finalize_result = self.engine.array_finalize(array);
        let close_result = if mode.is_read() {
            self.registry.release(&dir)
        } else {
            Ok(())
        };
        debug!(target: "tilestore::open", path = %dir.display(), "closed array");
        finalize_result?;
        close_result
    }

    /// Flush all written data of a write-mode array.
    pub fn array_sync(&self, handle: &mut ArrayHandle<E>) -> CatalogResult<()> {
        self.engine.array_sync(&mut handle.array)
    }

    /// Flush one attribute of a write-mode array.
    pub fn array_sync_attribute(
        &self,
        handle: &mut ArrayHandle<E>,
        attribute: &str,
    ) -> CatalogResult<()> {
        self.engine.array_sync_attribute(&mut handle.array, attribute)
    }

    /// Open the array at `array_dir` and build a cell iterator on it.
    pub fn array_iterator_init(
        &self,
        array_dir: impl AsRef<Path>,
        mode: ArrayMode,
        subarray: Option<&[u8]>,
        attributes: &[String],
    ) -> CatalogResult<ArrayIterator<E>> {
        let handle = self.array_init(array_dir, mode, subarray, attributes)?;
        let ArrayHandle { array, dir, mode } = handle;
        match self.engine.iterator_init(array) {
            Ok(iter) => Ok(ArrayIterator { iter, dir, mode }),
            Err(e) => {
                self.release_quietly(&dir, mode);
                Err(e)
            }
        }
    }

    /// Tear down a cell iterator and close its array.
    pub fn array_iterator_finalize(&self, iterator: ArrayIterator<E>) -> CatalogResult<()> {
        let ArrayIterator { iter, dir, mode } = iterator;
        let finalize_result = self.engine.iterator_finalize(iter);
        let close_result = if mode.is_read() {
            self.registry.release(&dir)
        } else {
            Ok(())
        };
        finalize_result?;
        close_result
    }

    // ========================================================================
    // Metadata open/close
    // ========================================================================

    /// Open the metadata object at `metadata_dir`.
    pub fn metadata_init(
        &self,
        metadata_dir: impl AsRef<Path>,
        mode: ArrayMode,
        attributes: &[String],
    ) -> CatalogResult<MetadataHandle<E>> {
        let dir = self.canonical(metadata_dir.as_ref())?;
        if !probe::is_metadata(&dir) {
            return Err(CatalogError::not_found(dir, "metadata"));
        }

        let contents = self.open_contents(&dir, ObjectKind::Metadata, mode)?;
        let array = self.build_engine_array(&dir, mode, None, attributes, contents)?;
        debug!(target: "tilestore::open", path = %dir.display(), mode = ?mode, "opened metadata");
        Ok(MetadataHandle { array, dir, mode })
    }

    /// Close a metadata handle.
    pub fn metadata_finalize(&self, handle: MetadataHandle<E>) -> CatalogResult<()> {
        let MetadataHandle { array, dir, mode } = handle;
        let finalize_result = self.engine.array_finalize(array);
        let close_result = if mode.is_read() {
            self.registry.release(&dir)
        } else {
            Ok(())
        };
        finalize_result?;
        close_result
    }

    /// Open the metadata object at `metadata_dir` and build a cell
    /// iterator on it.
    pub fn metadata_iterator_init(
        &self,
        metadata_dir: impl AsRef<Path>,
        attributes: &[String],
    ) -> CatalogResult<MetadataIterator<E>> {
        let handle = self.metadata_init(metadata_dir, ArrayMode::Read, attributes)?;
        let MetadataHandle { array, dir, mode } = handle;
        match self.engine.iterator_init(array) {
            Ok(iter) => Ok(MetadataIterator { iter, dir, mode }),
            Err(e) => {
                self.release_quietly(&dir, mode);
                Err(e)
            }
        }
    }

    /// Tear down a metadata iterator and close its object.
    pub fn metadata_iterator_finalize(
        &self,
        iterator: MetadataIterator<E>,
    ) -> CatalogResult<()> {
        let MetadataIterator { iter, dir, mode } = iterator;
        let finalize_result = self.engine.iterator_finalize(iter);
        let close_result = if mode.is_read() {
            self.registry.release(&dir)
        } else {
            Ok(())
        };
        finalize_result?;
        close_result
    }

    // ========================================================================
    // Registry plumbing
    // ========================================================================

    /// Obtain the cached contents of `dir`, loading them on first open.
    ///
    /// Write modes never touch the registry: they load the schema
    /// directly and see no fragments.
    fn open_contents(
        &self,
        dir: &Path,
        kind: ObjectKind,
        mode: ArrayMode,
    ) -> CatalogResult<OpenContents<E::BookKeeping>> {
        if !mode.is_read() {
            return Ok(OpenContents {
                schema: Arc::new(schema_io::load_schema(dir, kind)?),
                fragment_names: Vec::new(),
                book_keeping: Vec::new(),
            });
        }

        let entry = self.registry.get_or_create(dir);
        {
            let state = entry.state.lock();
            if let Some(schema) = &state.schema {
                return Ok(OpenContents {
                    schema: Arc::clone(schema),
                    fragment_names: state.fragment_names.clone(),
                    book_keeping: state.book_keeping.clone(),
                });
            }
        }

        match self.first_open_init(&entry, dir, kind, mode) {
            Ok(contents) => Ok(contents),
            Err(e) => {
                // The entry kept our reference; give it back so a
                // failed first open leaves no residue.
                self.release_quietly(dir, mode);
                Err(e)
            }
        }
    }

    /// First-open initialisation of a registry entry.
    ///
    /// The shared filelock is taken before the entry mutex (it may
    /// block cross-process) and before fragment enumeration, so the
    /// observed fragment set is stable against a consolidator's
    /// visibility swap. A racing initialiser is detected after the
    /// mutex is retaken and the redundant lock is dropped.
    fn first_open_init(
        &self,
        entry: &crate::registry::OpenArray<E::BookKeeping>,
        dir: &Path,
        kind: ObjectKind,
        mode: ArrayMode,
    ) -> CatalogResult<OpenContents<E::BookKeeping>> {
        if self.config.gc_on_open {
            if let Err(e) = self.fragment_gc(dir) {
                warn!(
                    target: "tilestore::open",
                    path = %dir.display(),
                    error = %e,
                    "fragment sweep failed on open"
                );
            }
        }

        let mut lock = Some(filelock::acquire_shared(dir)?);

        let mut state = entry.state.lock();
        if let Some(schema) = &state.schema {
            // Lost the initialisation race: reuse the winner's load.
            let contents = OpenContents {
                schema: Arc::clone(schema),
                fragment_names: state.fragment_names.clone(),
                book_keeping: state.book_keeping.clone(),
            };
            drop(state);
            if let Some(redundant) = lock.take() {
                if let Err(e) = filelock::release(redundant) {
                    warn!(
                        target: "tilestore::open",
                        path = %dir.display(),
                        error = %e,
                        "failed to release redundant shared filelock"
                    );
                }
            }
            return Ok(contents);
        }

        {
            let mut fragment_names = fragment::fragment_dirs(dir)?;
            fragment::sort_fragment_names(&mut fragment_names)?;
            let schema = Arc::new(schema_io::load_schema(dir, kind)?);

            let mut book_keeping = Vec::with_capacity(fragment_names.len());
            for fragment_dir in &fragment_names {
                book_keeping.push(Arc::new(self.engine.load_book_keeping(
                    &schema,
                    fragment_dir,
                    mode,
                )?));
            }

            state.filelock = lock.take();
            state.schema = Some(Arc::clone(&schema));
            state.fragment_names = fragment_names.clone();
            state.book_keeping = book_keeping.clone();
            debug!(
                target: "tilestore::open",
                path = %dir.display(),
                fragments = fragment_names.len(),
                "initialised open-array entry"
            );
            drop(state);
            Ok(OpenContents {
                schema,
                fragment_names,
                book_keeping,
            })
        }
    }

    /// Build the double-buffered engine array pair.
    fn build_engine_array(
        &self,
        dir: &Path,
        mode: ArrayMode,
        subarray: Option<&[u8]>,
        attributes: &[String],
        contents: OpenContents<E::BookKeeping>,
    ) -> CatalogResult<E::Array> {
        let request = ArrayOpenRequest {
            schema: contents.schema,
            fragment_names: contents.fragment_names,
            book_keeping: contents.book_keeping,
            mode,
            subarray: subarray.map(<[u8]>::to_vec),
            attributes: attributes.to_vec(),
        };

        let clone = match self.engine.array_init(request.clone(), None) {
            Ok(clone) => clone,
            Err(e) => {
                self.release_quietly(dir, mode);
                return Err(e);
            }
        };
        match self.engine.array_init(request, Some(Box::new(clone))) {
            Ok(array) => Ok(array),
            Err(e) => {
                self.release_quietly(dir, mode);
                Err(e)
            }
        }
    }

    /// Drop a registry reference on an error path, logging instead of
    /// masking the primary failure.
    fn release_quietly(&self, dir: &Path, mode: ArrayMode) {
        if !mode.is_read() {
            return;
        }
        if let Err(e) = self.registry.release(dir) {
            warn!(
                target: "tilestore::open",
                path = %dir.display(),
                error = %e,
                "failed to release registry entry on error path"
            );
        }
    }
}
