//! Storage manager: the public lifecycle surface
//!
//! `StorageManager` composes the path resolver, type probes,
//! directory operations, schema codec, and the open-array registry
//! into the catalog API: create, open, close, list, clear, delete,
//! move, and consolidate, per object kind.
//!
//! Every public path argument is canonicalised and validated before
//! any filesystem call; all containment rules are enforced here.

use crate::registry::OpenArrayRegistry;
use std::path::{Path, PathBuf};
use tilestore_core::constants::{
    ARRAY_SCHEMA_FILENAME, CONSOLIDATION_FILELOCK_NAME, GROUP_FILENAME,
    METADATA_SCHEMA_FILENAME, NAME_MAX_LEN, WORKSPACE_FILENAME,
};
use tilestore_core::{
    ArrayEngine, ArraySchema, CatalogError, CatalogResult, ObjectKind,
};
use tilestore_storage::probe::{self, DirClass};
use tilestore_storage::{filelock, fsutil, paths, schema_io};
use tracing::info;

/// Catalog configuration.
///
/// Mirrors the defaults of the on-disk contract; most deployments
/// never change it.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Maximum accepted path length in bytes; longer names are
    /// rejected with `InvalidName`.
    pub name_max_len: usize,
    /// Run the headless-fragment sweep on the first open of each
    /// object. Off by default; the sweep never blocks either way.
    pub gc_on_open: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            name_max_len: NAME_MAX_LEN,
            gc_on_open: false,
        }
    }
}

/// Catalog and lifecycle manager of one array store.
///
/// Generic over the array data engine; the catalog owns the lifetime
/// of every engine handle but never interprets cell data.
pub struct StorageManager<E: ArrayEngine> {
    pub(crate) engine: E,
    pub(crate) config: CatalogConfig,
    pub(crate) registry: OpenArrayRegistry<E::BookKeeping>,
}

impl<E: ArrayEngine> StorageManager<E> {
    /// Create a manager with default configuration.
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, CatalogConfig::default())
    }

    /// Create a manager with an explicit configuration.
    pub fn with_config(engine: E, config: CatalogConfig) -> Self {
        StorageManager {
            engine,
            config,
            registry: OpenArrayRegistry::new(),
        }
    }

    /// The array data engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The active configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The open-array registry (refcounts, cached loads).
    pub fn registry(&self) -> &OpenArrayRegistry<E::BookKeeping> {
        &self.registry
    }

    /// Canonicalise and validate a caller-supplied path.
    pub(crate) fn canonical(&self, dir: &Path) -> CatalogResult<PathBuf> {
        let raw = dir.as_os_str();
        if raw.is_empty() {
            return Err(CatalogError::invalid_name("", "empty path"));
        }
        if raw.len() > self.config.name_max_len {
            return Err(CatalogError::invalid_name(
                dir.to_string_lossy(),
                format!("path exceeds {} bytes", self.config.name_max_len),
            ));
        }
        let real = paths::real_dir(dir);
        if real.as_os_str().is_empty() {
            return Err(CatalogError::invalid_name(
                dir.to_string_lossy(),
                "path cannot be resolved to an absolute directory",
            ));
        }
        if real.as_os_str().len() > self.config.name_max_len {
            return Err(CatalogError::invalid_name(
                real.to_string_lossy(),
                format!("canonical path exceeds {} bytes", self.config.name_max_len),
            ));
        }
        Ok(real)
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Create a workspace at `workspace`.
    pub fn workspace_create(&self, workspace: impl AsRef<Path>) -> CatalogResult<()> {
        let dir = self.canonical(workspace.as_ref())?;
        let parent = paths::parent_dir(&dir);
        if probe::is_workspace(&parent)
            || probe::is_group(&parent)
            || probe::is_array(&parent)
            || probe::is_metadata(&parent)
        {
            return Err(CatalogError::invalid_containment(
                dir,
                "a workspace cannot live inside another workspace, group, array, or metadata",
            ));
        }

        fsutil::create_dir(&dir)?;
        fsutil::create_file(&dir.join(WORKSPACE_FILENAME))?;
        info!(target: "tilestore::catalog", path = %dir.display(), "created workspace");
        Ok(())
    }

    /// Create a group at `group`.
    pub fn group_create(&self, group: impl AsRef<Path>) -> CatalogResult<()> {
        let dir = self.canonical(group.as_ref())?;
        let parent = paths::parent_dir(&dir);
        if !probe::is_workspace(&parent) && !probe::is_group(&parent) {
            return Err(CatalogError::invalid_containment(
                dir,
                "a group must live inside a workspace or another group",
            ));
        }

        fsutil::create_dir(&dir)?;
        fsutil::create_file(&dir.join(GROUP_FILENAME))?;
        info!(target: "tilestore::catalog", path = %dir.display(), "created group");
        Ok(())
    }

    /// Create an array at the path embedded in `schema`.
    ///
    /// Stores the schema (with its name canonicalised) and creates
    /// the consolidation lockfile.
    pub fn array_create(&self, schema: &ArraySchema) -> CatalogResult<()> {
        let dir = self.canonical(schema.array_name())?;
        let parent = paths::parent_dir(&dir);
        if !probe::is_workspace(&parent) && !probe::is_group(&parent) {
            return Err(CatalogError::invalid_containment(
                dir,
                "an array must live inside a workspace or group",
            ));
        }

        fsutil::create_dir(&dir)?;
        let mut stored = schema.clone();
        stored.set_array_name(&dir);
        schema_io::store_schema(&dir, ObjectKind::Array, &stored)?;
        filelock::create(&dir)?;
        info!(target: "tilestore::catalog", path = %dir.display(), "created array");
        Ok(())
    }

    /// Create a metadata object at the path embedded in `schema`.
    pub fn metadata_create(&self, schema: &ArraySchema) -> CatalogResult<()> {
        let dir = self.canonical(schema.array_name())?;
        let parent = paths::parent_dir(&dir);
        if !probe::is_workspace(&parent)
            && !probe::is_group(&parent)
            && !probe::is_array(&parent)
        {
            return Err(CatalogError::invalid_containment(
                dir,
                "metadata must live inside a workspace, group, or array",
            ));
        }

        fsutil::create_dir(&dir)?;
        let mut stored = schema.clone();
        stored.set_array_name(&dir);
        schema_io::store_schema(&dir, ObjectKind::Metadata, &stored)?;
        filelock::create(&dir)?;
        info!(target: "tilestore::catalog", path = %dir.display(), "created metadata");
        Ok(())
    }

    // ========================================================================
    // Schema access
    // ========================================================================

    /// Load the schema of the array at `array_dir`.
    pub fn array_load_schema(&self, array_dir: impl AsRef<Path>) -> CatalogResult<ArraySchema> {
        let dir = self.canonical(array_dir.as_ref())?;
        if !probe::is_array(&dir) {
            return Err(CatalogError::not_found(dir, "array"));
        }
        schema_io::load_schema(&dir, ObjectKind::Array)
    }

    /// Load the schema of the metadata object at `metadata_dir`.
    pub fn metadata_load_schema(
        &self,
        metadata_dir: impl AsRef<Path>,
    ) -> CatalogResult<ArraySchema> {
        let dir = self.canonical(metadata_dir.as_ref())?;
        if !probe::is_metadata(&dir) {
            return Err(CatalogError::not_found(dir, "metadata"));
        }
        schema_io::load_schema(&dir, ObjectKind::Metadata)
    }

    // ========================================================================
    // Listing and probing
    // ========================================================================

    /// Kind of the object at `dir`; `Invalid` for anything that is
    /// not a catalog object.
    pub fn object_kind(&self, dir: impl AsRef<Path>) -> ObjectKind {
        probe::object_kind(&paths::real_dir(dir.as_ref()))
    }

    /// List the catalog objects directly under `parent`.
    ///
    /// Children that are not catalog objects (fragments included) are
    /// skipped. A missing parent lists as empty. More than `capacity`
    /// objects fail with `BufferOverflow` rather than truncating.
    pub fn ls(
        &self,
        parent: impl AsRef<Path>,
        capacity: usize,
    ) -> CatalogResult<Vec<(String, ObjectKind)>> {
        let parent = self.canonical(parent.as_ref())?;
        let names = match fsutil::child_names(&parent) {
            Ok(names) => names,
            Err(_) => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        for name in names {
            let kind = probe::object_kind(&parent.join(&name));
            if kind == ObjectKind::Invalid {
                continue;
            }
            if out.len() == capacity {
                return Err(CatalogError::buffer_overflow(capacity));
            }
            out.push((name, kind));
        }
        Ok(out)
    }

    /// Number of catalog objects directly under `parent`.
    pub fn ls_count(&self, parent: impl AsRef<Path>) -> CatalogResult<usize> {
        let parent = self.canonical(parent.as_ref())?;
        let names = match fsutil::child_names(&parent) {
            Ok(names) => names,
            Err(_) => return Ok(0),
        };
        Ok(names
            .into_iter()
            .filter(|name| probe::object_kind(&parent.join(name)) != ObjectKind::Invalid)
            .count())
    }

    // ========================================================================
    // Clear / delete / move
    // ========================================================================

    /// Remove the contents of the object at `dir`, preserving the
    /// object itself (sentinels, schema, lockfile).
    pub fn clear(&self, dir: impl AsRef<Path>) -> CatalogResult<()> {
        let dir = self.canonical(dir.as_ref())?;
        match probe::classify(&dir) {
            DirClass::Workspace => self.workspace_clear(&dir),
            DirClass::Group => self.group_clear(&dir),
            DirClass::Array => self.array_clear(&dir),
            DirClass::Metadata => self.metadata_clear(&dir),
            DirClass::Fragment | DirClass::Other => {
                Err(CatalogError::not_found(dir, "catalog object"))
            }
        }
    }

    /// Remove the object at `dir` and everything under it.
    pub fn delete_entire(&self, dir: impl AsRef<Path>) -> CatalogResult<()> {
        let dir = self.canonical(dir.as_ref())?;
        match probe::classify(&dir) {
            DirClass::Workspace => self.workspace_delete(&dir),
            DirClass::Group => self.group_delete(&dir),
            DirClass::Array => self.array_delete(&dir),
            DirClass::Metadata => self.metadata_delete(&dir),
            DirClass::Fragment | DirClass::Other => {
                Err(CatalogError::not_found(dir, "catalog object"))
            }
        }
    }

    /// Move the object at `old_dir` to `new_dir`.
    ///
    /// Validates the containment of the destination, requires it to
    /// not exist, and rewrites the embedded schema name for arrays
    /// and metadata.
    pub fn move_object(
        &self,
        old_dir: impl AsRef<Path>,
        new_dir: impl AsRef<Path>,
    ) -> CatalogResult<()> {
        let old = self.canonical(old_dir.as_ref())?;
        let new = self.canonical(new_dir.as_ref())?;
        match probe::classify(&old) {
            DirClass::Workspace => self.workspace_move(&old, &new),
            DirClass::Group => self.group_move(&old, &new),
            DirClass::Array => self.array_move(&old, &new),
            DirClass::Metadata => self.metadata_move(&old, &new),
            DirClass::Fragment | DirClass::Other => {
                Err(CatalogError::not_found(old, "catalog object"))
            }
        }
    }

    // ========================================================================
    // Per-kind clear
    // ========================================================================

    fn workspace_clear(&self, workspace: &Path) -> CatalogResult<()> {
        for name in fsutil::child_names(workspace)? {
            if name == WORKSPACE_FILENAME || name == GROUP_FILENAME {
                continue;
            }
            let child = workspace.join(&name);
            match probe::classify(&child) {
                DirClass::Group => self.group_delete(&child)?,
                DirClass::Metadata => self.metadata_delete(&child)?,
                DirClass::Array => self.array_delete(&child)?,
                _ => {
                    return Err(CatalogError::invalid_containment(
                        child,
                        "not a catalog object; refusing to delete",
                    ))
                }
            }
        }
        Ok(())
    }

    fn group_clear(&self, group: &Path) -> CatalogResult<()> {
        if probe::is_workspace(group) {
            return Err(CatalogError::invalid_containment(
                group,
                "group is also a workspace; clear it as a workspace",
            ));
        }
        for name in fsutil::child_names(group)? {
            if name == GROUP_FILENAME {
                continue;
            }
            let child = group.join(&name);
            match probe::classify(&child) {
                DirClass::Group => self.group_delete(&child)?,
                DirClass::Metadata => self.metadata_delete(&child)?,
                DirClass::Array => self.array_delete(&child)?,
                _ => {
                    return Err(CatalogError::invalid_containment(
                        child,
                        "not a catalog object; refusing to delete",
                    ))
                }
            }
        }
        Ok(())
    }

    fn array_clear(&self, array: &Path) -> CatalogResult<()> {
        if !probe::is_array(array) {
            return Err(CatalogError::not_found(array, "array"));
        }
        for name in fsutil::child_names(array)? {
            if name == ARRAY_SCHEMA_FILENAME || name == CONSOLIDATION_FILELOCK_NAME {
                continue;
            }
            let child = array.join(&name);
            match probe::classify(&child) {
                DirClass::Metadata => self.metadata_delete(&child)?,
                DirClass::Fragment => fsutil::delete_dir(&child)?,
                _ => {
                    return Err(CatalogError::invalid_containment(
                        child,
                        "not a catalog object; refusing to delete",
                    ))
                }
            }
        }
        Ok(())
    }

    fn metadata_clear(&self, metadata: &Path) -> CatalogResult<()> {
        if !probe::is_metadata(metadata) {
            return Err(CatalogError::not_found(metadata, "metadata"));
        }
        for name in fsutil::child_names(metadata)? {
            if name == METADATA_SCHEMA_FILENAME || name == CONSOLIDATION_FILELOCK_NAME {
                continue;
            }
            let child = metadata.join(&name);
            match probe::classify(&child) {
                DirClass::Fragment => fsutil::delete_dir(&child)?,
                _ => {
                    return Err(CatalogError::invalid_containment(
                        child,
                        "not a catalog object; refusing to delete",
                    ))
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Per-kind delete
    // ========================================================================

    fn workspace_delete(&self, workspace: &Path) -> CatalogResult<()> {
        self.workspace_clear(workspace)?;
        fsutil::delete_dir(workspace)
    }

    fn group_delete(&self, group: &Path) -> CatalogResult<()> {
        self.group_clear(group)?;
        fsutil::delete_dir(group)
    }

    fn array_delete(&self, array: &Path) -> CatalogResult<()> {
        self.array_clear(array)?;
        fsutil::delete_dir(array)
    }

    pub(crate) fn metadata_delete(&self, metadata: &Path) -> CatalogResult<()> {
        self.metadata_clear(metadata)?;
        fsutil::delete_dir(metadata)
    }

    // ========================================================================
    // Per-kind move
    // ========================================================================

    fn workspace_move(&self, old: &Path, new: &Path) -> CatalogResult<()> {
        if probe::is_dir(new) {
            return Err(CatalogError::already_exists(new));
        }
        let parent = paths::parent_dir(new);
        if probe::is_workspace(&parent)
            || probe::is_group(&parent)
            || probe::is_array(&parent)
            || probe::is_metadata(&parent)
        {
            return Err(CatalogError::invalid_containment(
                new,
                "a workspace cannot move into a workspace, group, array, or metadata",
            ));
        }
        fsutil::rename_dir(old, new)?;
        info!(target: "tilestore::catalog", old = %old.display(), new = %new.display(), "moved workspace");
        Ok(())
    }

    fn group_move(&self, old: &Path, new: &Path) -> CatalogResult<()> {
        if probe::is_workspace(old) {
            return Err(CatalogError::invalid_containment(
                old,
                "group is also a workspace; move it as a workspace",
            ));
        }
        if probe::is_dir(new) {
            return Err(CatalogError::already_exists(new));
        }
        let parent = paths::parent_dir(new);
        if !probe::is_workspace(&parent) && !probe::is_group(&parent) {
            return Err(CatalogError::invalid_containment(
                new,
                "a group must move into a workspace or group",
            ));
        }
        fsutil::rename_dir(old, new)?;
        info!(target: "tilestore::catalog", old = %old.display(), new = %new.display(), "moved group");
        Ok(())
    }

    fn array_move(&self, old: &Path, new: &Path) -> CatalogResult<()> {
        if probe::is_dir(new) {
            return Err(CatalogError::already_exists(new));
        }
        let parent = paths::parent_dir(new);
        if !probe::is_workspace(&parent) && !probe::is_group(&parent) {
            return Err(CatalogError::invalid_containment(
                new,
                "an array must move into a workspace or group",
            ));
        }
        fsutil::rename_dir(old, new)?;

        // The schema embeds the object path; rewrite it in place.
        let mut schema = schema_io::load_schema(new, ObjectKind::Array)?;
        schema.set_array_name(new);
        schema_io::store_schema(new, ObjectKind::Array, &schema)?;
        info!(target: "tilestore::catalog", old = %old.display(), new = %new.display(), "moved array");
        Ok(())
    }

    fn metadata_move(&self, old: &Path, new: &Path) -> CatalogResult<()> {
        if probe::is_dir(new) {
            return Err(CatalogError::already_exists(new));
        }
        let parent = paths::parent_dir(new);
        if !probe::is_workspace(&parent)
            && !probe::is_group(&parent)
            && !probe::is_array(&parent)
        {
            return Err(CatalogError::invalid_containment(
                new,
                "metadata must move into a workspace, group, or array",
            ));
        }
        fsutil::rename_dir(old, new)?;

        let mut schema = schema_io::load_schema(new, ObjectKind::Metadata)?;
        schema.set_array_name(new);
        schema_io::store_schema(new, ObjectKind::Metadata, &schema)?;
        info!(target: "tilestore::catalog", old = %old.display(), new = %new.display(), "moved metadata");
        Ok(())
    }
}
