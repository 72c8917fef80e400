// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! On-disk asset store.
//!
//! Layout, relative to the store root:
//!
//! ```text
//! <root>/
//! ├── configs/
//! ├── cached_manifest.json
//! └── resources/
//!     ├── pack.mcmeta
//!     └── assets/<namespace>/
//!         ├── glyphs/   (short-lived partition)
//!         └── icons/    (long-lived partition)
//! ```
//!
//! Presence is the only cache check: an entry that exists is used as-is, no
//! matter how old it is. Age only matters to the eviction sweep.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tempfile::NamedTempFile;

use super::key::CacheKey;
use crate::handoff::{ResourceHost, ResourceId};

/// Name of the sidecar file that marks `resources/` as a resource source.
pub const SIDECAR_FILE: &str = "pack.mcmeta";

/// Name of the cached bulk manifest at the store root.
pub const MANIFEST_FILE: &str = "cached_manifest.json";

const SIDECAR_DESCRIPTION: &str = "Dynamic mod resources are stored in this pack.";

/// Storage partition; each one has its own time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Small decorative assets (glyphs).
    ShortLived,
    /// Icons and resource bundles.
    LongLived,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::ShortLived, Partition::LongLived];

    /// Directory name of the partition below `assets/<namespace>/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::ShortLived => "glyphs",
            Partition::LongLived => "icons",
        }
    }
}

/// Handle to the on-disk store. Cheap to clone; every clone points at the
/// same directories.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    namespace: String,
}

impl AssetStore {
    /// Create a store rooted at `root`. Nothing is touched on disk until
    /// [`AssetStore::ensure_layout`] or a write is performed.
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("configs")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.root.join("resources")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.resources_dir().join("assets").join(&self.namespace)
    }

    pub fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.assets_dir().join(partition.dir_name())
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.resources_dir().join(SIDECAR_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Path an entry for `key` has (or would have) in `partition`.
    pub fn entry_path(&self, partition: Partition, key: &CacheKey) -> PathBuf {
        self.partition_dir(partition).join(key.file_name())
    }

    /// Resource id under which an entry is bound by the presentation layer.
    pub fn resource_id(&self, partition: Partition, key: &CacheKey) -> ResourceId {
        ResourceId::new(
            self.namespace.clone(),
            format!("{}/{}", partition.dir_name(), key.file_name()),
        )
    }

    /// Create the directory tree and (re)write the sidecar metadata file.
    ///
    /// Idempotent and safe to call from several threads at once: directory
    /// creation tolerates existing directories and the sidecar is replaced by
    /// an atomic rename.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.config_dir(), self.resources_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        for partition in Partition::ALL {
            let dir = self.partition_dir(partition);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create partition: {:?}", dir))?;
        }

        let sidecar = json!({
            "pack": {
                "pack_format": 1,
                "description": SIDECAR_DESCRIPTION,
            }
        });
        let content = serde_json::to_vec(&sidecar).context("Failed to serialize sidecar")?;
        write_atomically(&self.resources_dir(), &self.sidecar_path(), &content)
            .with_context(|| format!("Failed to write sidecar: {:?}", self.sidecar_path()))?;
        Ok(())
    }

    /// Register the resources directory with the presentation layer.
    pub fn register_with(&self, host: &mut dyn ResourceHost) -> Result<()> {
        host.register_source(&self.resources_dir())
            .context("Failed to register resource source")
    }

    /// True iff a regular file for `key` exists in `partition`. Age is not checked.
    pub fn exists(&self, partition: Partition, key: &CacheKey) -> bool {
        fs::metadata(self.entry_path(partition, key))
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// Write `bytes` as the entry for `key`, replacing any existing entry.
    ///
    /// The data goes to a uniquely named temp file in the partition and is
    /// renamed into place once complete, so [`AssetStore::exists`] never
    /// observes a partial write. Two concurrent writers for the same key both
    /// succeed; the last rename wins.
    pub fn persist(&self, partition: Partition, key: &CacheKey, bytes: &[u8]) -> io::Result<PathBuf> {
        let dir = self.partition_dir(partition);
        fs::create_dir_all(&dir)?;
        let path = dir.join(key.file_name());
        write_atomically(&dir, &path, bytes)?;
        Ok(path)
    }

    /// Store the bulk manifest. It has no time-to-live.
    pub fn save_manifest(&self, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create directory: {:?}", self.root))?;
        write_atomically(&self.root, &self.manifest_path(), bytes)
            .with_context(|| "Failed to write cached manifest")
    }

    /// Load the cached bulk manifest, if one was saved.
    pub fn load_manifest(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(self.manifest_path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| "Failed to read cached manifest"),
        }
    }
}

/// Write `bytes` to a temp file inside `dir` and rename it over `target`.
fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
