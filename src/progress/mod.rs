//! Durable resume points for workflows.
//!
//! `ProgressStore` keeps, per workflow, the furthest step index ever reached.
//! It sits on top of a namespaced `KvStore` so the engine can be run against
//! an in-memory fake in tests and a JSON file in the binary.

mod file;
mod memory;

use std::future::Future;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;

use crate::workflow::WorkflowId;
use crate::{wlog_debug, wlog_warn, Error, Result};

/// Key prefix of every progress record.
pub const KEY_PREFIX: &str = "workflow_progress_";

/// String key/value storage backing the progress records.
///
/// Uses native async fn in traits (RPITIT); implementations may be written
/// with plain `async fn`.
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Set a value for a key (upsert).
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// All keys currently stored, in ascending order.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Furthest-reached step index per workflow, merged with `max` on write.
pub struct ProgressStore<S> {
    kv: S,
    prefix: String,
}

impl<S: KvStore> ProgressStore<S> {
    pub fn new(kv: S) -> Self {
        Self::with_prefix(kv, KEY_PREFIX)
    }

    pub fn with_prefix(kv: S, prefix: impl Into<String>) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
        }
    }

    /// The storage key holding the record of `workflow_id`.
    pub fn key_for(&self, workflow_id: &WorkflowId) -> String {
        format!("{}{}", self.prefix, workflow_id)
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Stored progress, or 0 when the record is absent, malformed or unreadable.
    pub async fn get_progress(&self, workflow_id: &WorkflowId) -> usize {
        let key = self.key_for(workflow_id);
        match self.kv.get(&key).await {
            Ok(Some(raw)) => match parse_progress(&raw) {
                Some(index) => {
                    wlog_debug!("Progress read: {}={}", key, index);
                    index
                }
                None => {
                    wlog_warn!("Ignoring malformed progress {}={:?}", key, raw);
                    0
                }
            },
            Ok(None) => 0,
            Err(e) => {
                wlog_warn!("Progress read failed for {}: {}", key, e);
                0
            }
        }
    }

    /// Store `max(current, candidate)` and return the stored value.
    ///
    /// A malformed current value counts as 0 and is overwritten. An unreadable
    /// one aborts the save, since merging against an unknown value could lower
    /// the record.
    ///
    /// # Errors
    /// Returns `Error::ProgressWrite` when the current value cannot be read or
    /// the underlying write fails.
    pub async fn save_progress(&self, workflow_id: &WorkflowId, candidate: usize) -> Result<usize> {
        let key = self.key_for(workflow_id);
        let write_error = |e: Error| Error::ProgressWrite {
            workflow_id: workflow_id.to_string(),
            reason: e.to_string(),
        };

        let raw = self.kv.get(&key).await.map_err(write_error)?;
        let current = match raw.as_deref() {
            Some(raw) => parse_progress(raw).unwrap_or_else(|| {
                wlog_warn!("Overwriting malformed progress {}={:?}", key, raw);
                0
            }),
            None => 0,
        };
        let next = current.max(candidate);

        self.kv
            .set(&key, &next.to_string())
            .await
            .map_err(write_error)?;

        wlog_debug!(
            "Progress saved: {} current={} candidate={} stored={}",
            key,
            current,
            candidate,
            next
        );
        Ok(next)
    }

    /// Remove the record of `workflow_id`; the next read returns 0.
    pub async fn clear_progress(&self, workflow_id: &WorkflowId) -> Result<()> {
        let key = self.key_for(workflow_id);
        self.kv.remove(&key).await?;
        wlog_debug!("Progress cleared: {}", key);
        Ok(())
    }

    /// Every record under this store's prefix. Malformed values list as 0.
    pub async fn list_progress(&self) -> Result<Vec<(WorkflowId, usize)>> {
        let mut records = Vec::new();
        for key in self.kv.keys().await? {
            let Some(id) = key.strip_prefix(&self.prefix) else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            let raw = self.kv.get(&key).await?;
            let index = raw.as_deref().and_then(parse_progress).unwrap_or(0);
            records.push((WorkflowId::new(id), index));
        }
        Ok(records)
    }
}

/// Decimal text of a non-negative integer.
fn parse_progress(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()
}
