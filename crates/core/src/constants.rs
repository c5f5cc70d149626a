//! On-disk name constants and limits
//!
//! The sentinel filenames below are part of the external on-disk
//! contract: a directory is a catalog object iff it contains exactly
//! one of them. All sentinels are zero-byte files. Renaming any of
//! these breaks compatibility with existing stores.

/// Sentinel marking a directory as a workspace.
pub const WORKSPACE_FILENAME: &str = "__tiledb_workspace.tdb";

/// Sentinel marking a directory as a group.
pub const GROUP_FILENAME: &str = "__tiledb_group.tdb";

/// Schema file of an array; its presence marks the directory as an array.
pub const ARRAY_SCHEMA_FILENAME: &str = "__array_schema.tdb";

/// Schema file of a metadata object; doubles as its sentinel.
pub const METADATA_SCHEMA_FILENAME: &str = "__metadata_schema.tdb";

/// Visibility sentinel of a fragment directory.
pub const FRAGMENT_FILENAME: &str = "__tiledb_fragment.tdb";

/// Per-array consolidation lockfile. Readers hold a shared advisory
/// lock on it for the lifetime of their open; consolidators take it
/// exclusively while swapping fragment visibility.
pub const CONSOLIDATION_FILELOCK_NAME: &str = "__consolidation_lock.tdb";

/// Prefix every fragment directory name carries (`__<unique>_<timestamp>`).
pub const FRAGMENT_PREFIX: &str = "__";

/// Default maximum accepted length of an object path, in bytes.
///
/// Paths longer than this are rejected with `InvalidName` before any
/// filesystem call. Configurable via `CatalogConfig`.
pub const NAME_MAX_LEN: usize = 4096;
