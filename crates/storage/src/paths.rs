//! Lexical path canonicalisation
//!
//! Every object is identified by its canonical absolute path:
//! `~` expands to `$HOME`, relative inputs are anchored at the current
//! working directory, runs of `/` collapse, and `.`/`..` segments are
//! resolved lexically (no symlink chasing). A `..` that climbs above
//! the root produces the empty path, which callers must reject as an
//! invalid name.

use std::path::{Component, Path, PathBuf};

/// Canonicalise `dir` into an absolute path.
///
/// Returns the empty path when the input cannot be anchored (no
/// working directory, `~` without `$HOME`) or when `..` escapes the
/// root. Callers treat the empty path as `InvalidName`.
pub fn real_dir(dir: &Path) -> PathBuf {
    let current = std::env::current_dir().unwrap_or_default();
    let home: PathBuf = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();

    let joined = if dir.as_os_str().is_empty() || dir == Path::new(".") {
        current
    } else if dir == Path::new("~") {
        home
    } else if dir.is_absolute() {
        dir.to_path_buf()
    } else if let Ok(rest) = dir.strip_prefix("~") {
        home.join(rest)
    } else {
        current.join(dir)
    };

    // Anchoring failed (empty cwd or HOME): nothing sensible to return.
    if !joined.has_root() {
        return PathBuf::new();
    }

    normalize(&joined)
}

/// Parent of the canonical form of `dir`; empty at the root.
pub fn parent_dir(dir: &Path) -> PathBuf {
    real_dir(dir)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Resolve `.`/`..` segments lexically; collapse `/` runs.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push("/"),
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root invalidates the whole path.
                if !out.pop() {
                    return PathBuf::new();
                }
            }
            Component::Normal(segment) => out.push(segment),
            Component::Prefix(_) => {}
        }
    }
    out
}
