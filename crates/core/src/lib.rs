//! Core types for the tilestore catalog
//!
//! This crate defines the vocabulary shared by the storage and engine
//! layers:
//! - `CatalogError` / `CatalogResult`: the unified error model
//! - `ObjectKind` / `ArrayMode`: object classification and open modes
//! - `constants`: on-disk sentinel filenames and limits
//! - `ArraySchema`: the persistent schema record and its codec
//! - `ArrayEngine`: the seam to the array data engine
//!
//! The catalog treats the engine as an external collaborator: it owns
//! the lifetime of engine handles (arrays, iterators, bookkeeping) but
//! never interprets their contents.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod error;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{CatalogError, CatalogResult, ErrorKind};
pub use schema::ArraySchema;
pub use traits::{ArrayEngine, ArrayOpenRequest, ConsolidationPlan};
pub use types::{ArrayMode, ObjectKind};
