//! Audio storage collaborator.
//!
//! The pipeline reads and writes raw audio through a byte-buffer interface
//! keyed by an opaque path string; it assumes nothing about the storage
//! technology behind it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Byte-buffer storage keyed by opaque path strings.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Filesystem-backed store rooted at a directory.
pub struct FsAudioStore {
    root: PathBuf,
}

impl FsAudioStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        // Opaque keys are relative; strip any leading separator so they
        // stay under the root.
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))?;
        debug!(path, bytes = bytes.len(), "Stored audio");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path);
        tokio::fs::remove_file(&full)
            .await
            .with_context(|| format!("Failed to delete {}", full.display()))?;
        debug!(path, "Deleted audio");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryAudioStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAudioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a path currently holds bytes.
    pub async fn contains(&self, path: &str) -> bool {
        self.entries.read().await.contains_key(path)
    }
}

#[async_trait]
impl AudioStore for MemoryAudioStore {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .await
            .get(path)
            .cloned()
            .with_context(|| format!("No audio stored at {path}"))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .with_context(|| format!("No audio stored at {path}"))
    }
}
