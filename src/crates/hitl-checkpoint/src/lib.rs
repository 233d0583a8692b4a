//! # hitl-checkpoint - Durable state for paused workflows
//!
//! Storage layer for resumable human-in-the-loop workflows. A workflow thread
//! is persisted as an append-only chain of [`Checkpoint`]s; the latest one
//! says what state the thread is in, which step runs next, and whether an
//! approver still owes a decision ([`PendingInterrupt`]).
//!
//! ## Stores
//!
//! - [`InMemoryCheckpointStore`] - process-local, for tests and demos
//! - [`SqliteCheckpointStore`] - durable, survives restarts and can be shared
//!   by several processes on one host
//!
//! Both implement [`CheckpointStore`], whose `put` is an atomic append guarded
//! by the sequence the writer last read. Losing that race yields
//! [`CheckpointError::Stale`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use hitl_checkpoint::{Checkpoint, CheckpointSource, CheckpointStore, SqliteCheckpointStore};
//!
//! # async fn demo() -> hitl_checkpoint::Result<()> {
//! let store = SqliteCheckpointStore::connect("./data/checkpoints.db").await?;
//! let first = Checkpoint::initial("thread-1", "deployment_approval", Default::default(), Some("generate_proposal".into()));
//! store.put(&first, None).await?;
//!
//! let next = first.successor(CheckpointSource::Step);
//! store.put(&next, Some(first.sequence)).await?;
//! assert_eq!(store.latest_sequence("thread-1").await?, Some(1));
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod sqlite;
pub mod traits;

pub use checkpoint::{
    Checkpoint, CheckpointSource, InterruptWhen, PendingInterrupt, ThreadStatus, ThreadSummary,
    WorkflowState,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use serializer::{JsonSerializer, SerializerProtocol};
pub use sqlite::SqliteCheckpointStore;
pub use traits::CheckpointStore;
