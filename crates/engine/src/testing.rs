//! Mock array engine for tests
//!
//! `MockEngine` implements just enough of [`ArrayEngine`] to exercise
//! the catalog: bookkeeping loads verify the fragment sentinel,
//! consolidation merges all visible fragments into one scratch
//! directory, and visibility is flipped through the real sentinel
//! helpers. Cell data is a single file recording how many fragments
//! were merged.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tilestore_core::{
    ArrayEngine, ArrayMode, ArrayOpenRequest, ArraySchema, CatalogError, CatalogResult,
    ConsolidationPlan,
};
use tilestore_storage::{fragment, probe};

/// Test engine with optional failure injection.
pub struct MockEngine {
    fail_next_book_keeping: AtomicBool,
}

impl MockEngine {
    /// Create a mock engine.
    pub fn new() -> Self {
        MockEngine {
            fail_next_book_keeping: AtomicBool::new(false),
        }
    }

    /// Make the next `load_book_keeping` call fail once.
    pub fn fail_next_book_keeping(&self) {
        self.fail_next_book_keeping.store(true, Ordering::SeqCst);
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookkeeping record of one fragment.
#[derive(Debug)]
pub struct MockBookKeeping {
    /// Fragment this record belongs to.
    pub fragment_dir: PathBuf,
}

/// Engine-side array object.
#[derive(Debug)]
pub struct MockArray {
    /// Schema the array was opened with.
    pub schema: Arc<ArraySchema>,
    /// Fragments visible to this open.
    pub fragment_names: Vec<PathBuf>,
    /// Fragment each bookkeeping record was loaded from, in request order.
    pub book_keeping_dirs: Vec<PathBuf>,
    /// Open mode.
    pub mode: ArrayMode,
    /// Double-buffering companion.
    pub clone: Option<Box<MockArray>>,
}

/// Engine-side cell iterator.
pub struct MockIterator {
    /// The array being iterated.
    pub array: MockArray,
}

impl ArrayEngine for MockEngine {
    type Array = MockArray;
    type Iter = MockIterator;
    type BookKeeping = MockBookKeeping;

    fn load_book_keeping(
        &self,
        _schema: &ArraySchema,
        fragment_dir: &Path,
        _mode: ArrayMode,
    ) -> CatalogResult<MockBookKeeping> {
        if self.fail_next_book_keeping.swap(false, Ordering::SeqCst) {
            return Err(CatalogError::io(
                format!("cannot load bookkeeping for '{}'", fragment_dir.display()),
                io::Error::new(io::ErrorKind::Other, "injected failure"),
            ));
        }
        if !probe::is_fragment(fragment_dir) {
            return Err(CatalogError::not_found(fragment_dir, "fragment"));
        }
        Ok(MockBookKeeping {
            fragment_dir: fragment_dir.to_path_buf(),
        })
    }

    fn array_init(
        &self,
        request: ArrayOpenRequest<MockBookKeeping>,
        clone: Option<Box<MockArray>>,
    ) -> CatalogResult<MockArray> {
        let book_keeping_dirs = request
            .book_keeping
            .iter()
            .map(|bk| bk.fragment_dir.clone())
            .collect();
        Ok(MockArray {
            schema: request.schema,
            fragment_names: request.fragment_names,
            book_keeping_dirs,
            mode: request.mode,
            clone,
        })
    }

    fn array_finalize(&self, _array: MockArray) -> CatalogResult<()> {
        Ok(())
    }

    fn array_sync(&self, _array: &mut MockArray) -> CatalogResult<()> {
        Ok(())
    }

    fn array_sync_attribute(
        &self,
        _array: &mut MockArray,
        _attribute: &str,
    ) -> CatalogResult<()> {
        Ok(())
    }

    fn consolidate(&self, array: &mut MockArray) -> CatalogResult<ConsolidationPlan> {
        let object_dir = array.schema.array_name().to_path_buf();
        let old_fragments = array.fragment_names.clone();
        if old_fragments.is_empty() {
            return Ok(ConsolidationPlan {
                new_fragment: object_dir.join("__c_0"),
                old_fragments,
            });
        }

        // New timestamp strictly after every merged fragment.
        let mut timestamp = i64::MIN;
        for old_fragment in &old_fragments {
            timestamp = timestamp.max(fragment::fragment_timestamp(old_fragment)?);
        }
        timestamp += 100;

        let name = format!("__c_{timestamp}");
        let scratch = object_dir.join(format!(".{name}"));
        fs::create_dir(&scratch).map_err(|e| {
            CatalogError::io(
                format!("cannot create scratch fragment '{}'", scratch.display()),
                e,
            )
        })?;
        fs::write(scratch.join("cells.data"), old_fragments.len().to_string()).map_err(|e| {
            CatalogError::io("cannot write consolidated cells".to_string(), e)
        })?;

        Ok(ConsolidationPlan {
            new_fragment: object_dir.join(name),
            old_fragments,
        })
    }

    fn fragment_finalize(&self, fragment_dir: &Path) -> CatalogResult<()> {
        let name = fragment_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let scratch = fragment_dir
            .parent()
            .map(|parent| parent.join(format!(".{name}")))
            .unwrap_or_default();
        fs::rename(&scratch, fragment_dir).map_err(|e| {
            CatalogError::io(
                format!(
                    "cannot move scratch '{}' to '{}'",
                    scratch.display(),
                    fragment_dir.display()
                ),
                e,
            )
        })?;
        fragment::create_fragment_file(fragment_dir)
    }

    fn iterator_init(&self, array: MockArray) -> CatalogResult<MockIterator> {
        Ok(MockIterator { array })
    }

    fn iterator_finalize(&self, _iter: MockIterator) -> CatalogResult<()> {
        Ok(())
    }
}
