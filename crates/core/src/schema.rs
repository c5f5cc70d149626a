//! Persistent array schema
//!
//! `ArraySchema` is the record stored under `__array_schema.tdb` (or
//! `__metadata_schema.tdb`). The catalog only interprets two fields:
//! the embedded object name, rewritten when the object is moved, and
//! the attribute list, needed when metadata is consolidated with all
//! attributes open. Everything else the engine defines (domain, tile
//! extents, compression, ...) travels in `payload` as opaque bytes.
//!
//! Serialisation is `bincode` over the whole struct; the resulting
//! blob must round-trip bit-for-bit through the schema codec.

use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema of an array or metadata object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySchema {
    /// Canonical path of the object this schema belongs to.
    array_name: String,
    /// Attribute names, coordinates attribute last.
    attributes: Vec<String>,
    /// Engine-owned definition blob; opaque to the catalog.
    payload: Vec<u8>,
}

impl ArraySchema {
    /// Create a schema bound to `array_name`.
    pub fn new(
        array_name: impl Into<String>,
        attributes: Vec<String>,
        payload: Vec<u8>,
    ) -> Self {
        ArraySchema {
            array_name: array_name.into(),
            attributes,
            payload,
        }
    }

    /// The object path embedded in this schema.
    pub fn array_name(&self) -> &Path {
        Path::new(&self.array_name)
    }

    /// Rewrite the embedded object path (used by `move`).
    pub fn set_array_name(&mut self, name: impl Into<PathBuf>) {
        self.array_name = name.into().to_string_lossy().into_owned();
    }

    /// Attribute names, coordinates attribute included last.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Number of attributes, coordinates excluded.
    pub fn attribute_num(&self) -> usize {
        self.attributes.len().saturating_sub(1)
    }

    /// Engine-owned definition bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialise to the on-disk blob.
    pub fn serialize(&self) -> CatalogResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            CatalogError::schema_corrupt(&self.array_name, format!("cannot serialize: {e}"))
        })
    }

    /// Deserialise from an on-disk blob.
    pub fn deserialize(bytes: &[u8]) -> CatalogResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| CatalogError::schema_corrupt("", format!("cannot deserialize: {e}")))
    }
}
