//! JSON-file [`RecordStore`] backend.
//!
//! Each collection is one pretty-printed JSON file. A missing file reads as
//! an absent collection (and so loads empty).
//!
//! Multi-collection writes are staged: every collection is serialized to a
//! temporary file next to its target first, and only when all of them are
//! on disk are they renamed into place. A failure while staging leaves every
//! target untouched.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use crm_filler_core::models::Collection;
use crm_filler_core::store::RecordStore;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::config::StoreConfig;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    paths: HashMap<Collection, PathBuf>,
}

impl JsonFileStore {
    pub fn new(config: &StoreConfig) -> Self {
        let paths = Collection::ALL
            .iter()
            .map(|c| (*c, config.path_for(*c)))
            .collect();
        Self {
            dir: config.dir.clone(),
            paths,
        }
    }

    /// Store with the default file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(&StoreConfig {
            dir: dir.into(),
            companies: None,
            contacts: None,
            deals: None,
            meetings: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.paths
            .get(&collection)
            .cloned()
            .unwrap_or_else(|| self.dir.join(collection.default_file_name()))
    }

    /// Create the data directory and an empty array file for every missing
    /// collection. Existing files are left alone. Returns the files created.
    pub fn init(&self) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {}", self.dir.display()))?;

        let mut created = Vec::new();
        for collection in Collection::ALL {
            let path = self.path(collection);
            if path.exists() {
                continue;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, "[]\n")
                .with_context(|| format!("Failed to create {}", path.display()))?;
            created.push(path);
        }
        Ok(created)
    }

    fn stage(&self, collection: Collection, root: &Value) -> Result<(NamedTempFile, PathBuf)> {
        let target = self.path(collection);
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut json = serde_json::to_string_pretty(root)?;
        json.push('\n');

        let mut tmp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to stage {}", target.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        Ok((tmp, target))
    }

    /// Stage every collection, then rename them into place, synchronously.
    fn write_staged(&self, batch: &[(Collection, Value)]) -> Result<()> {
        let staged = batch
            .iter()
            .map(|(collection, root)| self.stage(*collection, root))
            .collect::<Result<Vec<_>>>()?;

        for (tmp, target) in staged {
            tmp.persist(&target)
                .map_err(|e| e.error)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }
        Ok(())
    }
}

/// Read and parse one collection file synchronously.
fn read_json(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let root = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(Some(root))
}

// File I/O, fsync and rename run on the blocking pool, off the server's workers.
#[async_trait]
impl RecordStore for JsonFileStore {
    async fn read_collection(&self, collection: Collection) -> Result<Option<Value>> {
        let path = self.path(collection);
        tokio::task::spawn_blocking(move || read_json(&path))
            .await
            .context("collection read task panicked")?
    }

    async fn write_collections(&self, batch: &[(Collection, Value)]) -> Result<()> {
        let store = self.clone();
        let batch = batch.to_vec();
        tokio::task::spawn_blocking(move || store.write_staged(&batch))
            .await
            .context("collection write task panicked")?
    }
}
