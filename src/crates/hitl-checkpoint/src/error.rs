//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// The writer based its work on a checkpoint that is no longer the latest.
    #[error(
        "Stale checkpoint for thread '{thread_id}': expected latest sequence {expected:?}, found {found:?}"
    )]
    Stale {
        thread_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    /// Whether this error came from an optimistic concurrency conflict
    pub fn is_stale(&self) -> bool {
        matches!(self, CheckpointError::Stale { .. })
    }
}
