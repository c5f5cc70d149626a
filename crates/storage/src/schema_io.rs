//! Schema blob storage
//!
//! Stores and loads the serialised schema under a fixed filename in
//! the object directory: `__array_schema.tdb` for arrays,
//! `__metadata_schema.tdb` for metadata. The blob round-trips
//! bit-for-bit; an empty schema file is corruption.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tilestore_core::constants::{ARRAY_SCHEMA_FILENAME, METADATA_SCHEMA_FILENAME};
use tilestore_core::{ArraySchema, CatalogError, CatalogResult, ObjectKind};

/// Schema filename for an object kind.
///
/// Only arrays and metadata carry schemas.
pub fn schema_filename(kind: ObjectKind) -> CatalogResult<&'static str> {
    match kind {
        ObjectKind::Array => Ok(ARRAY_SCHEMA_FILENAME),
        ObjectKind::Metadata => Ok(METADATA_SCHEMA_FILENAME),
        other => Err(CatalogError::invalid_name(
            other.as_str(),
            "object kind carries no schema",
        )),
    }
}

/// Store `schema` under `dir`, replacing any prior schema file.
///
/// The prior file is unlinked first so a concurrent reader holding it
/// open keeps its consistent copy.
pub fn store_schema(dir: &Path, kind: ObjectKind, schema: &ArraySchema) -> CatalogResult<()> {
    let path = dir.join(schema_filename(kind)?);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            CatalogError::io(format!("cannot replace schema '{}'", path.display()), e)
        })?;
    }

    let bytes = schema.serialize()?;
    let mut file = File::create(&path)
        .map_err(|e| CatalogError::io(format!("cannot create schema '{}'", path.display()), e))?;
    file.write_all(&bytes)
        .map_err(|e| CatalogError::io(format!("cannot write schema '{}'", path.display()), e))?;
    file.sync_all()
        .map_err(|e| CatalogError::io(format!("cannot sync schema '{}'", path.display()), e))
}

/// Load the schema stored under `dir`.
pub fn load_schema(dir: &Path, kind: ObjectKind) -> CatalogResult<ArraySchema> {
    let path = dir.join(schema_filename(kind)?);
    let bytes = fs::read(&path)
        .map_err(|e| CatalogError::io(format!("cannot read schema '{}'", path.display()), e))?;
    if bytes.is_empty() {
        return Err(CatalogError::schema_corrupt(dir, "empty schema file"));
    }
    ArraySchema::deserialize(&bytes)
        .map_err(|_| CatalogError::schema_corrupt(dir, "undecodable schema file"))
}
