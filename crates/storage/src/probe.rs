//! Sentinel-based directory classification
//!
//! A directory is a catalog object iff it contains the corresponding
//! sentinel file. Every probe is two `stat` calls: one on the
//! directory, one on the candidate sentinel. Probing a non-directory
//! yields `Other`.

use std::path::Path;
use tilestore_core::constants::{
    ARRAY_SCHEMA_FILENAME, FRAGMENT_FILENAME, GROUP_FILENAME, METADATA_SCHEMA_FILENAME,
    WORKSPACE_FILENAME,
};
use tilestore_core::ObjectKind;

/// Fine-grained probe result.
///
/// `ObjectKind` is the public four-kind enum; probing additionally
/// distinguishes fragments (which are not first-class objects) from
/// plain directories and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirClass {
    /// Carries the workspace sentinel.
    Workspace,
    /// Carries the group sentinel.
    Group,
    /// Carries the array schema file.
    Array,
    /// Carries the metadata schema file.
    Metadata,
    /// Carries the fragment sentinel.
    Fragment,
    /// Anything else, including non-directories.
    Other,
}

/// True iff `path` exists and is a directory.
pub fn is_dir(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// True iff `path` exists and is not a directory.
pub fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}

/// True iff `dir` is a workspace.
pub fn is_workspace(dir: &Path) -> bool {
    is_dir(dir) && is_file(&dir.join(WORKSPACE_FILENAME))
}

/// True iff `dir` is a group.
pub fn is_group(dir: &Path) -> bool {
    is_dir(dir) && is_file(&dir.join(GROUP_FILENAME))
}

/// True iff `dir` is an array.
pub fn is_array(dir: &Path) -> bool {
    is_dir(dir) && is_file(&dir.join(ARRAY_SCHEMA_FILENAME))
}

/// True iff `dir` is a metadata object.
pub fn is_metadata(dir: &Path) -> bool {
    is_dir(dir) && is_file(&dir.join(METADATA_SCHEMA_FILENAME))
}

/// True iff `dir` is a visible fragment.
pub fn is_fragment(dir: &Path) -> bool {
    is_dir(dir) && is_file(&dir.join(FRAGMENT_FILENAME))
}

/// Classify `dir` by its sentinel.
///
/// A workspace that is also a group classifies as a workspace; the
/// catalog itself never produces directories carrying more than one
/// sentinel apart from that pairing.
pub fn classify(dir: &Path) -> DirClass {
    if is_workspace(dir) {
        DirClass::Workspace
    } else if is_group(dir) {
        DirClass::Group
    } else if is_array(dir) {
        DirClass::Array
    } else if is_metadata(dir) {
        DirClass::Metadata
    } else if is_fragment(dir) {
        DirClass::Fragment
    } else {
        DirClass::Other
    }
}

/// Public object kind of `dir`; fragments and plain directories map
/// to `ObjectKind::Invalid`.
pub fn object_kind(dir: &Path) -> ObjectKind {
    match classify(dir) {
        DirClass::Workspace => ObjectKind::Workspace,
        DirClass::Group => ObjectKind::Group,
        DirClass::Array => ObjectKind::Array,
        DirClass::Metadata => ObjectKind::Metadata,
        DirClass::Fragment | DirClass::Other => ObjectKind::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fsutil::create_file(&dir.join(name)).unwrap();
    }

    #[test]
    fn test_probe_each_kind() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        for (name, sentinel, class) in [
            ("ws", WORKSPACE_FILENAME, DirClass::Workspace),
            ("g", GROUP_FILENAME, DirClass::Group),
            ("a", ARRAY_SCHEMA_FILENAME, DirClass::Array),
            ("m", METADATA_SCHEMA_FILENAME, DirClass::Metadata),
            ("__f_1", FRAGMENT_FILENAME, DirClass::Fragment),
        ] {
            let dir = root.join(name);
            std::fs::create_dir(&dir).unwrap();
            touch(&dir, sentinel);
            assert_eq!(classify(&dir), class, "{name}");
        }
    }

    #[test]
    fn test_plain_directory_is_other() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(classify(tmp.path()), DirClass::Other);
        assert_eq!(object_kind(tmp.path()), ObjectKind::Invalid);
    }

    #[test]
    fn test_non_directory_is_other() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain");
        touch(tmp.path(), "plain");
        assert_eq!(classify(&file), DirClass::Other);
        assert!(!is_workspace(&file));
        assert!(!is_fragment(&file));
    }

    #[test]
    fn test_missing_path_is_other() {
        assert_eq!(classify(Path::new("/definitely/not/here")), DirClass::Other);
        assert!(!is_dir(Path::new("/definitely/not/here")));
    }

    #[test]
    fn test_probe_uniqueness_for_catalog_dirs() {
        // A directory created by the catalog satisfies exactly one of
        // the kind predicates.
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        std::fs::create_dir(&a).unwrap();
        touch(&a, ARRAY_SCHEMA_FILENAME);

        let hits = [
            is_workspace(&a),
            is_group(&a),
            is_array(&a),
            is_metadata(&a),
            is_fragment(&a),
        ]
        .iter()
        .filter(|&&hit| hit)
        .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_object_kind_maps_fragment_to_invalid() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("__f_7");
        std::fs::create_dir(&f).unwrap();
        touch(&f, FRAGMENT_FILENAME);
        assert_eq!(classify(&f), DirClass::Fragment);
        assert_eq!(object_kind(&f), ObjectKind::Invalid);
    }
}
