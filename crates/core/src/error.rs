//! Error types for the tilestore catalog
//!
//! One unified error type, `CatalogError`, covers every catalog
//! operation. We use `thiserror` for `Display`/`Error` derivation.
//!
//! ## Canonical error kinds
//!
//! | Kind | Trigger |
//! |------|---------|
//! | InvalidContainment | Parent directory's kind violates the nesting rules |
//! | AlreadyExists | Target directory already present on create/move |
//! | NotFound | Probed kind does not match the expected kind |
//! | SchemaCorrupt | Empty, truncated, or undecodable schema file |
//! | BufferOverflow | Caller-provided listing capacity too small |
//! | InvalidName | Null, empty, over-long, or malformed name |
//! | LockError | Filelock open/acquire/release failure |
//! | IoError | Any other filesystem failure (message carries errno) |
//!
//! Propagation policy: failures return immediately, nothing retries.
//! The only deliberately swallowed error is a failed filelock unlock
//! after an otherwise successful operation, which is logged instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the catalog.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Canonical kind codes of `CatalogError`
///
/// The stable, coarse classification of every error variant. Frozen:
/// new variants must map onto one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Nesting rule violation
    InvalidContainment,
    /// Target already present
    AlreadyExists,
    /// Object missing or of the wrong kind
    NotFound,
    /// Schema file unusable
    SchemaCorrupt,
    /// Listing capacity exceeded
    BufferOverflow,
    /// Name rejected before touching the filesystem
    InvalidName,
    /// Consolidation filelock failure
    LockError,
    /// Other filesystem failure
    IoError,
}

impl ErrorKind {
    /// Canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidContainment => "InvalidContainment",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::SchemaCorrupt => "SchemaCorrupt",
            ErrorKind::BufferOverflow => "BufferOverflow",
            ErrorKind::InvalidName => "InvalidName",
            ErrorKind::LockError => "LockError",
            ErrorKind::IoError => "IoError",
        }
    }

    /// Parse a kind from its string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "InvalidContainment" => Some(ErrorKind::InvalidContainment),
            "AlreadyExists" => Some(ErrorKind::AlreadyExists),
            "NotFound" => Some(ErrorKind::NotFound),
            "SchemaCorrupt" => Some(ErrorKind::SchemaCorrupt),
            "BufferOverflow" => Some(ErrorKind::BufferOverflow),
            "InvalidName" => Some(ErrorKind::InvalidName),
            "LockError" => Some(ErrorKind::LockError),
            "IoError" => Some(ErrorKind::IoError),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for all catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The parent directory's kind violates the containment rules.
    #[error("invalid containment for '{}': {rule}", path.display())]
    InvalidContainment {
        /// Object whose creation or move was rejected
        path: PathBuf,
        /// The rule that was violated
        rule: String,
    },

    /// The target directory already exists.
    #[error("'{}' already exists", path.display())]
    AlreadyExists {
        /// Existing path
        path: PathBuf,
    },

    /// The path does not name an object of the expected kind.
    #[error("{expected} '{}' does not exist", path.display())]
    NotFound {
        /// Probed path
        path: PathBuf,
        /// What was expected there ("array", "group", "open-array entry", ...)
        expected: String,
    },

    /// The schema file is empty, truncated, or cannot be decoded.
    #[error("schema corrupt at '{}': {reason}", path.display())]
    SchemaCorrupt {
        /// Directory whose schema file is unusable
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The caller-provided listing capacity is too small.
    #[error("directory listing overflow (capacity {capacity})")]
    BufferOverflow {
        /// Capacity that was exceeded
        capacity: usize,
    },

    /// The name is empty, over-long, or otherwise malformed.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The consolidation filelock could not be opened, acquired, or released.
    #[error("filelock error at '{}': {message}", path.display())]
    LockError {
        /// Directory whose lockfile failed
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Any other filesystem failure.
    #[error("{message}: {source}")]
    Io {
        /// Operation context
        message: String,
        /// Underlying syscall error (carries the errno string)
        #[source]
        source: io::Error,
    },
}

impl CatalogError {
    /// Create an `InvalidContainment` error.
    pub fn invalid_containment(path: impl Into<PathBuf>, rule: impl Into<String>) -> Self {
        CatalogError::InvalidContainment {
            path: path.into(),
            rule: rule.into(),
        }
    }

    /// Create an `AlreadyExists` error.
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        CatalogError::AlreadyExists { path: path.into() }
    }

    /// Create a `NotFound` error.
    pub fn not_found(path: impl Into<PathBuf>, expected: impl Into<String>) -> Self {
        CatalogError::NotFound {
            path: path.into(),
            expected: expected.into(),
        }
    }

    /// Create a `SchemaCorrupt` error.
    pub fn schema_corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CatalogError::SchemaCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a `BufferOverflow` error.
    pub fn buffer_overflow(capacity: usize) -> Self {
        CatalogError::BufferOverflow { capacity }
    }

    /// Create an `InvalidName` error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CatalogError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a `LockError`.
    pub fn lock(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CatalogError::LockError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an `Io` error with operation context.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        CatalogError::Io {
            message: message.into(),
            source,
        }
    }

    /// Coarse kind code of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::InvalidContainment { .. } => ErrorKind::InvalidContainment,
            CatalogError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            CatalogError::NotFound { .. } => ErrorKind::NotFound,
            CatalogError::SchemaCorrupt { .. } => ErrorKind::SchemaCorrupt,
            CatalogError::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            CatalogError::InvalidName { .. } => ErrorKind::InvalidName,
            CatalogError::LockError { .. } => ErrorKind::LockError,
            CatalogError::Io { .. } => ErrorKind::IoError,
        }
    }

    /// True if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    /// True if this error came from the consolidation filelock.
    pub fn is_lock_error(&self) -> bool {
        matches!(self, CatalogError::LockError { .. })
    }

    /// True for validation errors that no retry can fix.
    ///
    /// Covers containment, naming, and capacity failures; the input
    /// must change for the operation to succeed.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CatalogError::InvalidContainment { .. }
                | CatalogError::InvalidName { .. }
                | CatalogError::BufferOverflow { .. }
        )
    }
}
