//! Failure recovery queue.
//!
//! Durable record of recordings whose pipeline run did not reach a
//! terminal success. Backed by Sled; values are MessagePack-encoded and
//! keyed by record UUID, so concurrent failures upsert independent keys
//! and never overwrite each other's state.
//!
//! Lifecycle: a record is created with retry count 0 when a run fails
//! terminally, updated in place on every failed manual retry, and removed
//! only once a retry transcribes successfully AND the transcript is
//! persisted downstream. Until then the stored raw-audio reference is the
//! pipeline's sole durability guarantee against data loss.

use anyhow::{Context, Result};
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::FailedRecording;

/// Sled-backed store of [`FailedRecording`] records.
#[derive(Clone)]
pub struct FailureQueue {
    db: Db,
    tree: Tree,
}

impl FailureQueue {
    /// Open (or create) a failure queue at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path).with_context(|| {
            format!(
                "Failed to open failure queue at {}",
                path.as_ref().display()
            )
        })?;
        let tree = db
            .open_tree("failed_recordings")
            .context("Failed to open failed_recordings tree")?;

        info!(
            path = %path.as_ref().display(),
            records = tree.len(),
            "Opened failure recovery queue"
        );

        Ok(Self { db, tree })
    }

    /// Create an in-memory queue (useful for testing).
    pub fn new_temp() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .context("Failed to create temporary failure queue")?;
        let tree = db
            .open_tree("failed_recordings")
            .context("Failed to open failed_recordings tree")?;
        Ok(Self { db, tree })
    }

    /// Insert or replace the record for its UUID. Called both when a run
    /// first fails and when a manual retry fails again.
    pub async fn record_failure(&self, record: &FailedRecording) -> Result<()> {
        let data = record
            .to_bytes()
            .context("Failed to serialize failure record")?;

        self.tree
            .insert(record.id.as_bytes(), data)
            .with_context(|| format!("Failed to upsert failure record {}", record.id))?;

        debug!(
            id = %record.id,
            retry_count = record.retry_count,
            error = %record.error,
            "Recorded pipeline failure"
        );
        Ok(())
    }

    /// Look up a record by its UUID without removing it.
    pub async fn get(&self, id: &Uuid) -> Result<Option<FailedRecording>> {
        match self.tree.get(id.as_bytes())? {
            Some(data) => {
                let record = FailedRecording::from_bytes(&data)
                    .context("Failed to deserialize failure record")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete a record once its retry is fully resolved. Returns whether a
    /// record existed.
    pub async fn remove(&self, id: &Uuid) -> Result<bool> {
        let removed = self.tree.remove(id.as_bytes())?.is_some();
        if removed {
            debug!(id = %id, "Removed resolved failure record");
        }
        Ok(removed)
    }

    /// All pending records, oldest first.
    pub async fn list(&self) -> Result<Vec<FailedRecording>> {
        let mut records = Vec::with_capacity(self.tree.len());
        for entry in self.tree.iter() {
            let (_, data) = entry?;
            let record = FailedRecording::from_bytes(&data)
                .context("Failed to deserialize failure record")?;
            records.push(record);
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.tree.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.tree.is_empty())
    }

    /// Drop all records. Destructive; used by tooling and tests.
    pub async fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        info!("Cleared failure recovery queue");
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .context("Failed to flush failure queue")?;
        Ok(())
    }

    /// Queue statistics for monitoring.
    pub fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            records: self.tree.len(),
            disk_size_bytes: self.db.size_on_disk()?,
        })
    }
}

/// Queue statistics.
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub records: usize,
    pub disk_size_bytes: u64,
}
