//! Per-array consolidation filelock
//!
//! Each array and metadata object carries a zero-byte lockfile,
//! `__consolidation_lock.tdb`, created with the object. Readers hold
//! a shared advisory lock on it for the whole lifetime of their open;
//! a consolidator takes it exclusively while it swaps fragment
//! visibility. The lock is whole-file and advisory, coordinates both
//! across processes and between handles within one process, and the
//! lock dies with its descriptor (unlock-on-close).
//!
//! Acquisition blocks with no deadline: consolidators wait out
//! readers, and new openers wait out a running exclusive phase. The
//! non-blocking probe exists only for the fragment garbage sweep.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tilestore_core::constants::CONSOLIDATION_FILELOCK_NAME;
use tilestore_core::{CatalogError, CatalogResult};

/// Create the lockfile alongside a new array or metadata object.
pub fn create(dir: &Path) -> CatalogResult<()> {
    crate::fsutil::create_file(&dir.join(CONSOLIDATION_FILELOCK_NAME))
}

fn open_lockfile(dir: &Path) -> CatalogResult<File> {
    let path = dir.join(CONSOLIDATION_FILELOCK_NAME);
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| CatalogError::lock(dir, format!("cannot open lockfile: {e}")))
}

/// Acquire a shared lock on the object's lockfile, blocking.
pub fn acquire_shared(dir: &Path) -> CatalogResult<File> {
    let file = open_lockfile(dir)?;
    file.lock_shared()
        .map_err(|e| CatalogError::lock(dir, format!("cannot acquire shared lock: {e}")))?;
    Ok(file)
}

/// Acquire an exclusive lock on the object's lockfile, blocking.
pub fn acquire_exclusive(dir: &Path) -> CatalogResult<File> {
    let file = open_lockfile(dir)?;
    file.lock_exclusive()
        .map_err(|e| CatalogError::lock(dir, format!("cannot acquire exclusive lock: {e}")))?;
    Ok(file)
}

/// Try to acquire an exclusive lock without blocking.
///
/// Returns `None` when any other handle holds the lock. Used by the
/// fragment garbage sweep; never a substitute for the blocking paths.
pub fn try_acquire_exclusive(dir: &Path) -> CatalogResult<Option<File>> {
    let file = open_lockfile(dir)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
        Err(e) => Err(CatalogError::lock(
            dir,
            format!("cannot acquire exclusive lock: {e}"),
        )),
    }
}

/// Release a held lock and close its descriptor.
pub fn release(file: File) -> CatalogResult<()> {
    file.unlock()
        .map_err(|e| CatalogError::lock("", format!("cannot release lock: {e}")))
    // `file` drops here, closing the descriptor.
}
