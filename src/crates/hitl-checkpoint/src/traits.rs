//! The storage seam for checkpoints
//!
//! [`CheckpointStore`] is the only thing the engine knows about persistence.
//! Implementations must make [`CheckpointStore::put`] atomic: either the
//! checkpoint becomes the thread's new latest record, or nothing is written.
//!
//! # Optimistic concurrency
//!
//! `put` takes the sequence the writer read before doing its work
//! (`expected_latest`). When the thread's latest sequence differs, the write
//! is rejected with [`CheckpointError::Stale`](crate::CheckpointError::Stale)
//! and the caller must reload. This is what keeps two resumers of the same
//! paused thread from both applying a decision, even across processes.
//!
//! ```rust,ignore
//! let latest = store.get_latest("thread-1").await?;
//! let next = latest.successor(CheckpointSource::Step);
//! store.put(&next, Some(latest.sequence)).await?;
//! ```

use crate::checkpoint::{Checkpoint, ThreadSummary};
use crate::error::Result;
use async_trait::async_trait;

/// Durable, append-only checkpoint storage keyed by thread id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Most recent checkpoint of a thread, if the thread exists
    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Append a checkpoint.
    ///
    /// `expected_latest` is the sequence the caller read (`None` when it
    /// expects the thread not to exist yet). The checkpoint's own sequence
    /// must be `expected_latest + 1`, or `0` for a new thread.
    async fn put(&self, checkpoint: &Checkpoint, expected_latest: Option<u64>) -> Result<()>;

    /// Checkpoints of a thread, newest first
    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>>;

    /// Remove every checkpoint of a thread. Returns how many were removed.
    async fn delete_thread(&self, thread_id: &str) -> Result<u64>;

    /// Latest position of every known thread
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>>;

    /// Latest sequence of a thread, if it exists
    async fn latest_sequence(&self, thread_id: &str) -> Result<Option<u64>> {
        Ok(self.get_latest(thread_id).await?.map(|c| c.sequence))
    }
}

/// Shared validation for `put` implementations
pub(crate) fn check_sequence(checkpoint: &Checkpoint, expected_latest: Option<u64>) -> Result<()> {
    if checkpoint.thread_id.is_empty() {
        return Err(crate::CheckpointError::Invalid("thread_id is required".to_string()));
    }
    let wanted = expected_latest.map_or(0, |seq| seq + 1);
    if checkpoint.sequence != wanted {
        return Err(crate::CheckpointError::Invalid(format!(
            "checkpoint sequence {} does not follow expected latest {:?}",
            checkpoint.sequence, expected_latest
        )));
    }
    Ok(())
}
