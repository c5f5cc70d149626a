//! Filesystem layer of the tilestore catalog
//!
//! This crate implements every direct filesystem interaction of the
//! catalog:
//! - `paths`: lexical canonicalisation and parent resolution
//! - `probe`: sentinel-based classification of directories
//! - `fsutil`: create/delete/rename directories, touch sentinel files
//! - `schema_io`: store/load of the schema blob
//! - `fragment`: fragment discovery, name parsing, timestamp ordering
//! - `filelock`: the per-array shared/exclusive consolidation lock
//!
//! No in-memory state lives here; everything is a function over paths.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod filelock;
pub mod fragment;
pub mod fsutil;
pub mod paths;
pub mod probe;
pub mod schema_io;

pub use probe::DirClass;
