//! Directory and sentinel-file operations
//!
//! Thin wrappers over the filesystem syscalls the catalog needs.
//! Every failure maps to a `CatalogError` with the operation context
//! and the errno string in the message chain.

use crate::probe;
use std::fs::{self, OpenOptions};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tilestore_core::{CatalogError, CatalogResult};

/// Create `dir` with owner-only permissions.
///
/// Fails with `AlreadyExists` if anything is already at `dir`.
pub fn create_dir(dir: &Path) -> CatalogResult<()> {
    if probe::is_dir(dir) {
        return Err(CatalogError::already_exists(dir));
    }
    fs::DirBuilder::new()
        .mode(0o700)
        .create(dir)
        .map_err(|e| CatalogError::io(format!("cannot create directory '{}'", dir.display()), e))
}

/// Recursively remove `dir`.
pub fn delete_dir(dir: &Path) -> CatalogResult<()> {
    fs::remove_dir_all(dir)
        .map_err(|e| CatalogError::io(format!("cannot delete directory '{}'", dir.display()), e))
}

/// Rename `old` to `new` in a single `rename(2)`.
///
/// Callers verify preconditions (existence, containment) beforehand.
pub fn rename_dir(old: &Path, new: &Path) -> CatalogResult<()> {
    fs::rename(old, new).map_err(|e| {
        CatalogError::io(
            format!("cannot rename '{}' to '{}'", old.display(), new.display()),
            e,
        )
    })
}

/// Touch `path` (zero-byte sentinel) and flush it to disk.
pub fn create_file(path: &Path) -> CatalogResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| CatalogError::io(format!("cannot create file '{}'", path.display()), e))?;
    file.sync_all()
        .map_err(|e| CatalogError::io(format!("cannot sync file '{}'", path.display()), e))
}

/// Remove a single file.
pub fn delete_file(path: &Path) -> CatalogResult<()> {
    fs::remove_file(path)
        .map_err(|e| CatalogError::io(format!("cannot delete file '{}'", path.display()), e))
}

/// Names of all children of `dir`, `.`/`..` excluded, in directory order.
pub fn child_names(dir: &Path) -> CatalogResult<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| CatalogError::io(format!("cannot open directory '{}'", dir.display()), e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            CatalogError::io(format!("cannot read directory '{}'", dir.display()), e)
        })?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Full paths of all child directories of `dir`, in directory order.
pub fn child_dirs(dir: &Path) -> CatalogResult<Vec<PathBuf>> {
    Ok(child_names(dir)?
        .into_iter()
        .map(|name| dir.join(name))
        .filter(|path| probe::is_dir(path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("obj");
        create_dir(&dir).unwrap();
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_create_dir_rejects_existing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("obj");
        create_dir(&dir).unwrap();
        let err = create_dir(&dir).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists { .. }));
    }

    #[test]
    fn test_delete_dir_is_recursive() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("obj");
        fs::create_dir_all(dir.join("nested/deep")).unwrap();
        create_file(&dir.join("nested/file")).unwrap();
        delete_dir(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_rename_dir() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("old");
        let new = tmp.path().join("new");
        create_dir(&old).unwrap();
        rename_dir(&old, &new).unwrap();
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[test]
    fn test_create_file_is_zero_byte() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sentinel");
        create_file(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        // Touching again must not fail or truncate other state.
        create_file(&path).unwrap();
    }

    #[test]
    fn test_child_names_skips_dot_entries() {
        let tmp = TempDir::new().unwrap();
        create_dir(&tmp.path().join("d1")).unwrap();
        create_file(&tmp.path().join("f1")).unwrap();
        let mut names = child_names(tmp.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["d1".to_string(), "f1".to_string()]);
    }

    #[test]
    fn test_child_dirs_excludes_files() {
        let tmp = TempDir::new().unwrap();
        create_dir(&tmp.path().join("d1")).unwrap();
        create_file(&tmp.path().join("f1")).unwrap();
        let dirs = child_dirs(tmp.path()).unwrap();
        assert_eq!(dirs, vec![tmp.path().join("d1")]);
    }

    #[test]
    fn test_errors_carry_errno_string() {
        let err = delete_dir(Path::new("/definitely/not/here")).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("cannot delete directory"));
        assert!(msg.to_lowercase().contains("no such file"));
    }
}
