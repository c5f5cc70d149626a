//! Object kinds and open modes
//!
//! `ObjectKind` is the public classification of a catalog directory.
//! Its integer codes are stable within a process (and, by convention,
//! across releases): `Invalid` replaces the `-1` sentinel older
//! implementations returned for "not a catalog object".

use serde::{Deserialize, Serialize};

/// Kind of a persistent catalog object.
///
/// Exactly four kinds exist on disk; `Invalid` is the answer for any
/// directory (or non-directory) that carries none of the sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ObjectKind {
    /// Top-level container; may not live inside another catalog object.
    Workspace = 0,
    /// Nested container; lives in a workspace or group.
    Group = 1,
    /// Multidimensional array; lives in a workspace or group.
    Array = 2,
    /// Key-value array; lives in a workspace, group, or array.
    Metadata = 3,
    /// Not a catalog object.
    Invalid = -1,
}

impl ObjectKind {
    /// Canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Workspace => "workspace",
            ObjectKind::Group => "group",
            ObjectKind::Array => "array",
            ObjectKind::Metadata => "metadata",
            ObjectKind::Invalid => "invalid",
        }
    }

    /// Stable integer code of this kind.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Parse a kind from its integer code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ObjectKind::Workspace,
            1 => ObjectKind::Group,
            2 => ObjectKind::Array,
            3 => ObjectKind::Metadata,
            _ => ObjectKind::Invalid,
        }
    }

    /// True for the two container kinds (workspace, group).
    pub fn is_container(&self) -> bool {
        matches!(self, ObjectKind::Workspace | ObjectKind::Group)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mode an array or metadata object is opened in.
///
/// Read modes go through the open-array registry and hold the shared
/// consolidation filelock; write modes bypass the registry entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMode {
    /// Read cells; enters the registry and pins the fragment set.
    Read,
    /// Append a new fragment; does not enter the registry.
    Write,
}

impl ArrayMode {
    /// True iff this mode reads existing fragments.
    pub fn is_read(&self) -> bool {
        matches!(self, ArrayMode::Read)
    }
}
