//! Fragment discovery and timestamp ordering
//!
//! Fragment directories are named `__<unique>_<timestamp>`: a `__`
//! prefix, an arbitrary uniqueness string, and a decimal `i64`
//! timestamp after the first `_` that follows the prefix. Only
//! directories carrying the fragment sentinel are visible.
//!
//! Consumers rely on a deterministic write order: discovery sorts
//! fragments ascending by timestamp with a stable sort, so equal
//! timestamps keep their directory-listing order.

use crate::{fsutil, probe};
use std::path::{Path, PathBuf};
use tilestore_core::constants::{FRAGMENT_FILENAME, FRAGMENT_PREFIX};
use tilestore_core::{CatalogError, CatalogResult};

/// Visible fragment directories under `array_dir`, unsorted.
///
/// A child is a fragment iff its name starts with `__` and it carries
/// the fragment sentinel; everything else (schema file, lockfile,
/// metadata children, engine scratch) is skipped.
pub fn fragment_dirs(array_dir: &Path) -> CatalogResult<Vec<PathBuf>> {
    Ok(fsutil::child_dirs(array_dir)?
        .into_iter()
        .filter(|dir| {
            dir.file_name()
                .map(|name| name.to_string_lossy().starts_with(FRAGMENT_PREFIX))
                .unwrap_or(false)
                && probe::is_fragment(dir)
        })
        .collect())
}

/// Timestamp embedded in a fragment directory name.
pub fn fragment_timestamp(fragment_dir: &Path) -> CatalogResult<i64> {
    let name = fragment_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stripped = name.strip_prefix(FRAGMENT_PREFIX).ok_or_else(|| {
        CatalogError::invalid_name(name.clone(), "fragment name must start with '__'")
    })?;
    let (_, timestamp) = stripped.split_once('_').ok_or_else(|| {
        CatalogError::invalid_name(name.clone(), "fragment name carries no timestamp")
    })?;
    timestamp.parse::<i64>().map_err(|_| {
        CatalogError::invalid_name(name.clone(), "fragment timestamp is not a decimal integer")
    })
}

/// Sort fragment paths ascending by embedded timestamp.
///
/// The sort is stable: equal timestamps keep their original order.
/// Any unparseable name fails the whole load; engines never produce
/// such names.
pub fn sort_fragment_names(fragment_names: &mut Vec<PathBuf>) -> CatalogResult<()> {
    let mut keyed: Vec<(i64, PathBuf)> = Vec::with_capacity(fragment_names.len());
    for name in fragment_names.drain(..) {
        keyed.push((fragment_timestamp(&name)?, name));
    }
    keyed.sort_by_key(|(timestamp, _)| *timestamp);
    fragment_names.extend(keyed.into_iter().map(|(_, name)| name));
    Ok(())
}

/// Touch the fragment sentinel, making `fragment_dir` visible.
pub fn create_fragment_file(fragment_dir: &Path) -> CatalogResult<()> {
    fsutil::create_file(&fragment_dir.join(FRAGMENT_FILENAME))
}

/// Remove the fragment sentinel, hiding `fragment_dir` from new opens.
pub fn delete_fragment_file(fragment_dir: &Path) -> CatalogResult<()> {
    fsutil::delete_file(&fragment_dir.join(FRAGMENT_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_fragment(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir(&dir).unwrap();
        create_fragment_file(&dir).unwrap();
        dir
    }

    #[test]
    fn test_timestamp_parsing() {
        assert_eq!(fragment_timestamp(Path::new("/a/__f1_100")).unwrap(), 100);
        assert_eq!(fragment_timestamp(Path::new("/a/__x_3")).unwrap(), 3);
        assert_eq!(
            fragment_timestamp(Path::new("/a/__u_-7")).unwrap(),
            -7,
            "timestamps are signed"
        );
    }

    #[test]
    fn test_timestamp_rejects_malformed_names() {
        // No `__` prefix.
        assert!(fragment_timestamp(Path::new("/a/f1_100")).is_err());
        // No separator after the prefix.
        assert!(fragment_timestamp(Path::new("/a/__f1")).is_err());
        // Non-numeric timestamp.
        assert!(fragment_timestamp(Path::new("/a/__f1_abc")).is_err());
    }

    #[test]
    fn test_sort_ascending() {
        let mut names = vec![
            PathBuf::from("/a/__x_3"),
            PathBuf::from("/a/__y_1"),
            PathBuf::from("/a/__z_2"),
        ];
        sort_fragment_names(&mut names).unwrap();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/a/__y_1"),
                PathBuf::from("/a/__z_2"),
                PathBuf::from("/a/__x_3"),
            ]
        );
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut names = vec![
            PathBuf::from("/a/__b_5"),
            PathBuf::from("/a/__a_5"),
            PathBuf::from("/a/__c_1"),
        ];
        sort_fragment_names(&mut names).unwrap();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/a/__c_1"),
                PathBuf::from("/a/__b_5"),
                PathBuf::from("/a/__a_5"),
            ]
        );
    }

    #[test]
    fn test_sort_total_order_over_permutations() {
        let sorted: Vec<PathBuf> = (0..6).map(|i| PathBuf::from(format!("/a/__f_{i}"))).collect();
        // Rotate through a handful of permutations; each must converge
        // to the unique ascending order.
        let mut perm = sorted.clone();
        for _ in 0..6 {
            perm.rotate_left(1);
            let mut names = perm.clone();
            sort_fragment_names(&mut names).unwrap();
            assert_eq!(names, sorted);
        }
    }

    #[test]
    fn test_sort_propagates_bad_names() {
        let mut names = vec![PathBuf::from("/a/__ok_1"), PathBuf::from("/a/bad")];
        assert!(sort_fragment_names(&mut names).is_err());
    }

    #[test]
    fn test_fragment_dirs_filters_non_fragments() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let f1 = make_fragment(root, "__f1_100");
        let f2 = make_fragment(root, "__f2_200");

        // Headless directory: fragment-shaped name, no sentinel.
        std::fs::create_dir(root.join("__headless_300")).unwrap();
        // Engine scratch: dot-prefixed.
        std::fs::create_dir(root.join(".__scratch_400")).unwrap();
        // Plain file and plain directory.
        fsutil::create_file(&root.join("__array_schema.tdb")).unwrap();
        std::fs::create_dir(root.join("not_a_fragment")).unwrap();

        let mut dirs = fragment_dirs(root).unwrap();
        dirs.sort();
        assert_eq!(dirs, vec![f1, f2]);
    }

    #[test]
    fn test_sentinel_create_and_delete() {
        let tmp = TempDir::new().unwrap();
        let dir = make_fragment(tmp.path(), "__f_1");
        assert!(probe::is_fragment(&dir));
        delete_fragment_file(&dir).unwrap();
        assert!(!probe::is_fragment(&dir));
        assert!(dir.exists());
    }
}
