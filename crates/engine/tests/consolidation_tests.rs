//! Consolidation protocol, clear/delete, and the garbage sweep
//!
//! The visibility swap is observed through the public surface: after
//! a consolidation only the merged fragment is discoverable, and the
//! retired directories are gone. Reader interaction is exercised with
//! a blocked consolidator thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tilestore_core::constants::{ARRAY_SCHEMA_FILENAME, CONSOLIDATION_FILELOCK_NAME};
use tilestore_core::{ArrayMode, ArraySchema, ErrorKind};
use tilestore_engine::testing::MockEngine;
use tilestore_engine::StorageManager;
use tilestore_storage::fragment;

fn manager() -> (TempDir, StorageManager<MockEngine>) {
    (TempDir::new().unwrap(), StorageManager::new(MockEngine::new()))
}

fn schema_for(path: &Path) -> ArraySchema {
    ArraySchema::new(
        path.to_string_lossy(),
        vec!["a1".into(), "__coords".into()],
        vec![0x11],
    )
}

fn array_with_fragments(
    sm: &StorageManager<MockEngine>,
    root: &Path,
    fragments: &[&str],
) -> PathBuf {
    let ws = root.join("ws");
    let array = ws.join("a");
    sm.workspace_create(&ws).unwrap();
    sm.array_create(&schema_for(&array)).unwrap();
    for name in fragments {
        add_fragment(&array, name);
    }
    array
}

fn add_fragment(object: &Path, name: &str) -> PathBuf {
    let dir = object.join(name);
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("cells.data"), b"cells").unwrap();
    fragment::create_fragment_file(&dir).unwrap();
    dir
}

fn visible_fragments(object: &Path) -> Vec<String> {
    let mut names = fragment::fragment_dirs(object).unwrap();
    fragment::sort_fragment_names(&mut names).unwrap();
    names
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_consolidation_replaces_old_fragments() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100", "__f2_200", "__f3_300"]);

    sm.array_consolidate(&array).unwrap();

    // Only the merged fragment remains visible...
    assert_eq!(visible_fragments(&array), vec!["__c_400"]);
    // ...and the retired directories are gone entirely.
    assert!(!array.join("__f1_100").exists());
    assert!(!array.join("__f2_200").exists());
    assert!(!array.join("__f3_300").exists());
    // The registry is back to empty and no lock is left behind.
    assert!(sm.registry().is_empty());
    assert!(tilestore_storage::filelock::try_acquire_exclusive(
        &tilestore_storage::paths::real_dir(&array)
    )
    .unwrap()
    .is_some());
}

#[test]
fn test_consolidated_fragment_carries_merged_cells() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100", "__f2_200", "__f3_300"]);

    sm.array_consolidate(&array).unwrap();

    let merged = array.join("__c_400");
    let cells = std::fs::read_to_string(merged.join("cells.data")).unwrap();
    assert_eq!(cells, "3");
}

#[test]
fn test_consolidate_without_fragments_is_trivial() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &[]);

    sm.array_consolidate(&array).unwrap();
    assert!(visible_fragments(&array).is_empty());
    assert!(sm.registry().is_empty());
}

#[test]
fn test_repeated_consolidation_advances_timestamp() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100", "__f2_200"]);

    sm.array_consolidate(&array).unwrap();
    assert_eq!(visible_fragments(&array), vec!["__c_300"]);

    add_fragment(&array, "__f4_350");
    sm.array_consolidate(&array).unwrap();
    assert_eq!(visible_fragments(&array), vec!["__c_450"]);
}

#[test]
fn test_metadata_consolidation() {
    let (tmp, sm) = manager();
    let ws = tmp.path().join("ws");
    let metadata = ws.join("m");
    sm.workspace_create(&ws).unwrap();
    sm.metadata_create(&schema_for(&metadata)).unwrap();
    add_fragment(&metadata, "__m1_10");
    add_fragment(&metadata, "__m2_20");

    sm.metadata_consolidate(&metadata).unwrap();
    assert_eq!(visible_fragments(&metadata), vec!["__c_120"]);
    assert!(sm.registry().is_empty());
}

#[test]
fn test_consolidation_waits_for_readers() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100", "__f2_200"]);
    let sm = Arc::new(sm);

    let reader = sm.array_init(&array, ArrayMode::Read, None, &[]).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let consolidator = {
        let sm = Arc::clone(&sm);
        let array = array.clone();
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            sm.array_consolidate(&array).unwrap();
            done.store(true, Ordering::SeqCst);
        })
    };

    // The visibility swap must wait for the reader's shared lock.
    std::thread::sleep(Duration::from_millis(150));
    assert!(!done.load(Ordering::SeqCst));

    sm.array_finalize(reader).unwrap();
    consolidator.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(visible_fragments(&array), vec!["__c_300"]);
}

#[test]
fn test_open_after_consolidation_sees_merged_fragment() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100", "__f2_200"]);

    sm.array_consolidate(&array).unwrap();

    let handle = sm.array_init(&array, ArrayMode::Read, None, &[]).unwrap();
    let names: Vec<String> = handle
        .engine_array()
        .fragment_names
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["__c_300"]);
    sm.array_finalize(handle).unwrap();
}

#[test]
fn test_clear_array_preserves_schema_and_lockfile() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100", "__f2_200"]);
    sm.metadata_create(&schema_for(&array.join("m"))).unwrap();

    let schema_before = std::fs::read(array.join(ARRAY_SCHEMA_FILENAME)).unwrap();
    sm.clear(&array).unwrap();

    assert_eq!(
        std::fs::read(array.join(ARRAY_SCHEMA_FILENAME)).unwrap(),
        schema_before
    );
    assert!(array.join(CONSOLIDATION_FILELOCK_NAME).exists());
    assert!(visible_fragments(&array).is_empty());
    assert!(!array.join("m").exists());
}

#[test]
fn test_clear_workspace_preserves_sentinels() {
    let (tmp, sm) = manager();
    let ws = tmp.path().join("ws");
    sm.workspace_create(&ws).unwrap();
    sm.group_create(ws.join("g")).unwrap();
    sm.array_create(&schema_for(&ws.join("a"))).unwrap();

    sm.clear(&ws).unwrap();
    assert!(sm.ls(&ws, 8).unwrap().is_empty());
    assert!(ws.join(tilestore_core::constants::WORKSPACE_FILENAME).exists());
}

#[test]
fn test_clear_aborts_on_foreign_child() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100"]);
    std::fs::write(array.join("notes.txt"), b"not ours").unwrap();

    let err = sm.clear(&array).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContainment);
    // The fragment may or may not have been deleted before the abort;
    // the foreign file must be untouched either way.
    assert!(array.join("notes.txt").exists());
}

#[test]
fn test_delete_entire_removes_object() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100"]);

    sm.delete_entire(&array).unwrap();
    assert!(!array.exists());

    let ws = tmp.path().join("ws");
    sm.delete_entire(&ws).unwrap();
    assert!(!ws.exists());
}

#[test]
fn test_clear_on_plain_directory_is_not_found() {
    let (tmp, sm) = manager();
    let err = sm.clear(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_fragment_gc_reaps_headless_directories() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100"]);

    // Residue of a crash between visibility swap and deletion.
    std::fs::create_dir(array.join("__dead_50")).unwrap();
    std::fs::write(array.join("__dead_50/cells.data"), b"stale").unwrap();
    // In-progress engine scratch; must never be touched.
    std::fs::create_dir(array.join(".__c_900")).unwrap();

    assert_eq!(sm.fragment_gc(&array).unwrap(), 1);
    assert!(!array.join("__dead_50").exists());
    assert!(array.join(".__c_900").exists());
    assert_eq!(visible_fragments(&array), vec!["__f1_100"]);
}

#[test]
fn test_fragment_gc_backs_off_under_readers() {
    let (tmp, sm) = manager();
    let array = array_with_fragments(&sm, tmp.path(), &["__f1_100"]);
    std::fs::create_dir(array.join("__dead_50")).unwrap();

    let reader = sm.array_init(&array, ArrayMode::Read, None, &[]).unwrap();
    // The sweep never blocks: with the shared lock held it does nothing.
    assert_eq!(sm.fragment_gc(&array).unwrap(), 0);
    assert!(array.join("__dead_50").exists());

    sm.array_finalize(reader).unwrap();
    assert_eq!(sm.fragment_gc(&array).unwrap(), 1);
}

#[test]
fn test_fragment_gc_rejects_non_objects() {
    let (tmp, sm) = manager();
    let err = sm.fragment_gc(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
