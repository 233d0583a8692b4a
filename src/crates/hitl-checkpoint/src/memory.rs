//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointStore`] keeps every thread's chain in a
//! `HashMap<String, Vec<Checkpoint>>` behind a tokio `RwLock`. It honours the
//! same optimistic concurrency contract as the SQLite store, but nothing
//! survives the process.

use crate::checkpoint::{Checkpoint, ThreadSummary};
use crate::error::{CheckpointError, Result};
use crate::traits::{check_sequence, CheckpointStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local checkpoint store
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with at least one checkpoint
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of stored checkpoints
    pub async fn checkpoint_count(&self) -> usize {
        self.storage.read().await.values().map(Vec::len).sum()
    }

    /// Drop everything (test isolation)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).and_then(|chain| chain.last().cloned()))
    }

    async fn put(&self, checkpoint: &Checkpoint, expected_latest: Option<u64>) -> Result<()> {
        check_sequence(checkpoint, expected_latest)?;

        let mut storage = self.storage.write().await;
        let found = storage
            .get(&checkpoint.thread_id)
            .and_then(|chain| chain.last())
            .map(|c| c.sequence);
        if found != expected_latest {
            return Err(CheckpointError::Stale {
                thread_id: checkpoint.thread_id.clone(),
                expected: expected_latest,
                found,
            });
        }
        storage
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn list(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>> {
        let storage = self.storage.read().await;
        let Some(chain) = storage.get(thread_id) else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(usize::MAX);
        Ok(chain.iter().rev().take(limit).cloned().collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        let mut storage = self.storage.write().await;
        Ok(storage.remove(thread_id).map_or(0, |chain| chain.len() as u64))
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        let storage = self.storage.read().await;
        let mut threads: Vec<ThreadSummary> = storage
            .values()
            .filter_map(|chain| chain.last())
            .map(ThreadSummary::from)
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointSource, WorkflowState};
    use serde_json::json;

    fn initial(thread_id: &str) -> Checkpoint {
        let state = json!({"count": 0}).as_object().cloned().unwrap();
        Checkpoint::initial(thread_id, "counter", state, Some("increment".into()))
    }

    #[tokio::test]
    async fn test_put_and_get_latest() {
        let store = InMemoryCheckpointStore::new();
        let first = initial("t1");
        store.put(&first, None).await.unwrap();

        let second = first.successor(CheckpointSource::Step).with_next_step(None);
        store.put(&second, Some(0)).await.unwrap();

        let latest = store.get_latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.sequence, 1);
        assert_eq!(store.checkpoint_count().await, 2);
        assert_eq!(store.thread_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_thread() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.get_latest("nope").await.unwrap().is_none());
        assert!(store.list("nope", None).await.unwrap().is_empty());
        assert_eq!(store.delete_thread("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let store = InMemoryCheckpointStore::new();
        let first = initial("t1");
        store.put(&first, None).await.unwrap();

        let a = first.successor(CheckpointSource::Step);
        let b = first.successor(CheckpointSource::Resume);
        store.put(&a, Some(0)).await.unwrap();

        let err = store.put(&b, Some(0)).await.unwrap_err();
        assert!(err.is_stale());

        // Second start on the same thread
        let err = store.put(&initial("t1"), None).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Stale { found: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_sequence_must_follow_expected() {
        let store = InMemoryCheckpointStore::new();
        let mut bad = initial("t1");
        bad.sequence = 3;
        let err = store.put(&bad, None).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));

        let mut anonymous = Checkpoint::initial("", "wf", WorkflowState::new(), None);
        anonymous.sequence = 0;
        assert!(store.put(&anonymous, None).await.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let store = InMemoryCheckpointStore::new();
        let mut current = initial("t1");
        store.put(&current, None).await.unwrap();
        for _ in 0..4 {
            let next = current.successor(CheckpointSource::Step);
            store.put(&next, Some(current.sequence)).await.unwrap();
            current = next;
        }

        let history = store.list("t1", Some(3)).await.unwrap();
        let sequences: Vec<u64> = history.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn test_delete_and_list_threads() {
        let store = InMemoryCheckpointStore::new();
        store.put(&initial("a"), None).await.unwrap();
        store.put(&initial("b"), None).await.unwrap();

        let threads = store.list_threads().await.unwrap();
        assert_eq!(threads.len(), 2);

        assert_eq!(store.delete_thread("a").await.unwrap(), 1);
        let threads = store.list_threads().await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].thread_id, "b");

        store.clear().await;
        assert_eq!(store.thread_count().await, 0);
    }
}
