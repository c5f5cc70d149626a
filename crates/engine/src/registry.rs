//! Per-process open-array registry
//!
//! The registry deduplicates schema and bookkeeping loads across
//! concurrent openers of the same object. One entry exists per open
//! object, keyed by canonical path, holding a refcount, the cached
//! schema, the pinned fragment list with its bookkeeping, and the
//! shared consolidation filelock.
//!
//! ## Locking
//!
//! A single registry mutex guards the map; each entry carries its own
//! leaf mutex over its state. The registry mutex may be held while
//! taking an entry mutex, never the other way around. Slow first-open
//! I/O runs under the entry mutex only, so the registry stays
//! available to other threads.
//!
//! Uses `parking_lot::Mutex` so a panicking opener cannot poison the
//! registry for the rest of the process.
//!
//! ## Entry lifetime
//!
//! `ABSENT -> NASCENT` on first `get_or_create` (refcount 1, empty
//! content); `NASCENT -> READY` when the first opener installs the
//! schema; `READY -> ABSENT` when the final `release` drops the
//! refcount to zero and tears the entry down. A NASCENT entry whose
//! initialisation failed reverts to ABSENT when its sole creator
//! releases.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tilestore_core::{ArraySchema, CatalogError, CatalogResult};
use tilestore_storage::filelock;
use tracing::warn;

/// Mutable state of one open object, guarded by the entry mutex.
///
/// All fields except `refcount` are written once, by the first
/// opener, and read-only afterwards until teardown.
pub(crate) struct OpenArrayState<B> {
    /// Number of live client handles on this object.
    pub refcount: usize,
    /// Cached schema; `Some` marks the entry as initialised.
    pub schema: Option<Arc<ArraySchema>>,
    /// Fragments visible to this incarnation, in timestamp order.
    pub fragment_names: Vec<PathBuf>,
    /// Per-fragment bookkeeping, aligned 1:1 with `fragment_names`.
    pub book_keeping: Vec<Arc<B>>,
    /// Shared consolidation filelock held for this incarnation.
    pub filelock: Option<File>,
}

/// One registry entry.
pub struct OpenArray<B> {
    pub(crate) state: Mutex<OpenArrayState<B>>,
}

impl<B> OpenArray<B> {
    fn new() -> Self {
        OpenArray {
            state: Mutex::new(OpenArrayState {
                refcount: 0,
                schema: None,
                fragment_names: Vec::new(),
                book_keeping: Vec::new(),
                filelock: None,
            }),
        }
    }
}

/// Registry of open objects, keyed by canonical path.
pub struct OpenArrayRegistry<B> {
    open_arrays: Mutex<HashMap<PathBuf, Arc<OpenArray<B>>>>,
}

impl<B> OpenArrayRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        OpenArrayRegistry {
            open_arrays: Mutex::new(HashMap::new()),
        }
    }

    /// Look up or insert the entry for `path` and take a reference on it.
    ///
    /// Lookup, insertion, and the refcount increment are one atomic
    /// step with respect to every other registry operation.
    pub fn get_or_create(&self, path: &Path) -> Arc<OpenArray<B>> {
        let mut map = self.open_arrays.lock();
        let entry = map
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(OpenArray::new()));
        let entry = Arc::clone(entry);
        entry.state.lock().refcount += 1;
        entry
    }

    /// Drop one reference on `path`; tear the entry down on zero.
    ///
    /// Teardown releases the shared filelock (a failed release is
    /// logged, the operation still succeeds), frees the cached schema
    /// and bookkeeping, and removes the entry from the map.
    pub fn release(&self, path: &Path) -> CatalogResult<()> {
        let mut map = self.open_arrays.lock();
        let entry = map
            .get(path)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(path, "open-array entry"))?;

        let mut state = entry.state.lock();
        state.refcount -= 1;
        if state.refcount > 0 {
            return Ok(());
        }

        if let Some(lock) = state.filelock.take() {
            if let Err(e) = filelock::release(lock) {
                warn!(
                    target: "tilestore::registry",
                    path = %path.display(),
                    error = %e,
                    "failed to release shared filelock on close"
                );
            }
        }
        state.schema = None;
        state.fragment_names.clear();
        state.book_keeping.clear();
        drop(state);

        map.remove(path);
        Ok(())
    }

    /// Number of open objects.
    pub fn len(&self) -> usize {
        self.open_arrays.lock().len()
    }

    /// True iff no object is open.
    pub fn is_empty(&self) -> bool {
        self.open_arrays.lock().is_empty()
    }

    /// Refcount of `path`, if open.
    pub fn refcount(&self, path: &Path) -> Option<usize> {
        self.open_arrays
            .lock()
            .get(path)
            .map(|entry| entry.state.lock().refcount)
    }
}

impl<B> Default for OpenArrayRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_counts_references() {
        let registry: OpenArrayRegistry<()> = OpenArrayRegistry::new();
        let path = Path::new("/store/a");

        let _e1 = registry.get_or_create(path);
        let _e2 = registry.get_or_create(path);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.refcount(path), Some(2));
    }

    #[test]
    fn test_release_tears_down_on_zero() {
        let registry: OpenArrayRegistry<()> = OpenArrayRegistry::new();
        let path = Path::new("/store/a");

        registry.get_or_create(path);
        registry.get_or_create(path);

        registry.release(path).unwrap();
        assert_eq!(registry.refcount(path), Some(1));

        registry.release(path).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_unknown_path_is_not_found() {
        let registry: OpenArrayRegistry<()> = OpenArrayRegistry::new();
        let err = registry.release(Path::new("/store/missing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_distinct_paths_get_distinct_entries() {
        let registry: OpenArrayRegistry<()> = OpenArrayRegistry::new();
        registry.get_or_create(Path::new("/store/a"));
        registry.get_or_create(Path::new("/store/b"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.refcount(Path::new("/store/a")), Some(1));
    }

    #[test]
    fn test_concurrent_balanced_open_close_ends_empty() {
        use std::sync::Barrier;

        let registry: Arc<OpenArrayRegistry<()>> = Arc::new(OpenArrayRegistry::new());
        let barrier = Arc::new(Barrier::new(8));
        let path = PathBuf::from("/store/contended");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..100 {
                        registry.get_or_create(&path);
                        registry.release(&path).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
