//! Consolidation orchestrator
//!
//! Consolidation merges an object's fragments into one and retires
//! the originals. The catalog drives the swap; the engine does the
//! cell merging. Protocol:
//!
//! 1. Open the object read-mode (shared filelock via the registry).
//! 2. Engine writes the merged fragment into scratch and reports the
//!    fragments it replaces.
//! 3. Close the handle's registry entry, dropping our shared lock.
//! 4. Acquire the exclusive filelock (waits out every reader).
//! 5. Engine finalises the new fragment: it becomes visible.
//! 6. Delete only the sentinel of each old fragment: they become
//!    invisible to new openers while in-flight reads stay intact.
//! 7. Release the exclusive lock, then delete the old directories.
//!
//! A crash between steps 5 and 6 leaves old and new fragments both
//! visible; readers tolerate the overlap. A crash between 6 and 7
//! leaves headless directories, which `fragment_gc` reaps.

use crate::handle::{ArrayHandle, MetadataHandle};
use crate::manager::StorageManager;
use std::path::Path;
use tilestore_core::constants::FRAGMENT_PREFIX;
use tilestore_core::{ArrayEngine, ArrayMode, CatalogError, CatalogResult, ConsolidationPlan};
use tilestore_storage::probe::{self, DirClass};
use tilestore_storage::{filelock, fragment, fsutil, paths};
use tracing::{info, warn};

impl<E: ArrayEngine> StorageManager<E> {
    /// Consolidate the fragments of the array at `array_dir`.
    pub fn array_consolidate(&self, array_dir: impl AsRef<Path>) -> CatalogResult<()> {
        let handle = self.array_init(array_dir, ArrayMode::Read, None, &[])?;
        let ArrayHandle { array, dir, .. } = handle;
        self.consolidate_object(array, &dir)
    }

    /// Consolidate the fragments of the metadata object at
    /// `metadata_dir`.
    ///
    /// Metadata is consolidated with every attribute open, so the
    /// attribute list comes from the stored schema.
    pub fn metadata_consolidate(&self, metadata_dir: impl AsRef<Path>) -> CatalogResult<()> {
        let schema = self.metadata_load_schema(metadata_dir.as_ref())?;
        let attributes = schema.attributes().to_vec();

        let handle = self.metadata_init(metadata_dir, ArrayMode::Read, &attributes)?;
        let MetadataHandle { array, dir, .. } = handle;
        self.consolidate_object(array, &dir)
    }

    /// Drive one consolidation over an open engine array.
    ///
    /// Every stage runs regardless of earlier failures (the engine
    /// object must be finalised and the registry reference returned
    /// either way); the first failure in pipeline order is reported.
    fn consolidate_object(&self, mut array: E::Array, dir: &Path) -> CatalogResult<()> {
        let consolidate_result = self.engine.consolidate(&mut array);

        // Our shared filelock drops with the registry entry; the
        // exclusive phase must not start before that.
        let close_result = self.registry.release(dir);

        let finalize_result = match &consolidate_result {
            Ok(plan) => self.consolidation_finalize(plan),
            Err(_) => Ok(()),
        };

        let engine_finalize_result = self.engine.array_finalize(array);

        let plan = consolidate_result?;
        close_result?;
        finalize_result?;
        engine_finalize_result?;

        info!(
            target: "tilestore::consolidation",
            path = %dir.display(),
            retired = plan.old_fragments.len(),
            "consolidated"
        );
        Ok(())
    }

    /// Swap fragment visibility under the exclusive filelock.
    fn consolidation_finalize(&self, plan: &ConsolidationPlan) -> CatalogResult<()> {
        // Nothing was consolidated.
        if plan.old_fragments.is_empty() {
            return Ok(());
        }

        let object_dir = paths::parent_dir(&plan.new_fragment);
        let lock = filelock::acquire_exclusive(&object_dir)?;

        // New fragment becomes visible to new openers.
        self.engine.fragment_finalize(&plan.new_fragment)?;

        // Old fragments become invisible to new openers; their
        // directories stay for any read that already resolved them.
        for old_fragment in &plan.old_fragments {
            fragment::delete_fragment_file(old_fragment)?;
        }

        // The swap is done; a failed unlock must not fail it.
        if let Err(e) = filelock::release(lock) {
            warn!(
                target: "tilestore::consolidation",
                path = %object_dir.display(),
                error = %e,
                "failed to release exclusive filelock after visibility swap"
            );
        }

        for old_fragment in &plan.old_fragments {
            fsutil::delete_dir(old_fragment)?;
        }
        Ok(())
    }

    /// Reap headless fragment directories under an array or metadata
    /// object.
    ///
    /// A headless directory is a `__*` child without the fragment
    /// sentinel: the residue of a crash between the visibility swap
    /// and the directory deletion. The sweep only runs when the
    /// exclusive filelock is free (no readers, no consolidator) and
    /// returns without blocking otherwise. Engines stage in-progress
    /// fragments under dot-prefixed scratch names, which the sweep
    /// never touches.
    ///
    /// Returns the number of directories reaped.
    pub fn fragment_gc(&self, dir: impl AsRef<Path>) -> CatalogResult<usize> {
        let dir = self.canonical(dir.as_ref())?;
        if !probe::is_array(&dir) && !probe::is_metadata(&dir) {
            return Err(CatalogError::not_found(dir, "array or metadata"));
        }

        let Some(lock) = filelock::try_acquire_exclusive(&dir)? else {
            return Ok(0);
        };

        let mut reaped = 0usize;
        for child in fsutil::child_dirs(&dir)? {
            if is_headless_fragment(&child) {
                fsutil::delete_dir(&child)?;
                reaped += 1;
            }
        }

        if let Err(e) = filelock::release(lock) {
            warn!(
                target: "tilestore::consolidation",
                path = %dir.display(),
                error = %e,
                "failed to release exclusive filelock after sweep"
            );
        }

        if reaped > 0 {
            info!(
                target: "tilestore::consolidation",
                path = %dir.display(),
                reaped,
                "reaped headless fragment directories"
            );
        }
        Ok(reaped)
    }
}

/// A fragment-named directory that carries no sentinel and is no
/// other kind of catalog object.
fn is_headless_fragment(child: &Path) -> bool {
    let fragment_named = child
        .file_name()
        .map(|name| name.to_string_lossy().starts_with(FRAGMENT_PREFIX))
        .unwrap_or(false);
    fragment_named && probe::classify(child) == DirClass::Other
}
