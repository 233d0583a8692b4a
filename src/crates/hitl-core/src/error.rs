//! Error types for workflow definition and execution
//!
//! ```text
//! GraphError
//! ├── Definition             - invalid workflow structure, caught at build time
//! ├── NoPendingInterrupt     - resume on a thread that is not paused
//! ├── StaleCheckpoint        - lost an optimistic concurrency race
//! ├── Storage                - checkpoint store failure
//! ├── StepExecution          - a step returned an error
//! ├── InvalidResumeValue     - decision payload rejected by the suspended step
//! ├── InvalidInput           - malformed input or state update
//! ├── Thread*                - thread lifecycle conflicts
//! ├── IncompatibleCheckpoint - checkpoint does not fit the loaded workflow
//! ├── StepLimitExceeded      - run guard tripped
//! └── UnknownWorkflow        - registry lookup failed
//! ```
//!
//! Every variant maps to a stable snake_case [`GraphError::kind`] which the
//! HTTP layer and CLI report verbatim.

use hitl_checkpoint::CheckpointError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Structural problems in a workflow definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("no start step set")]
    MissingStart,

    #[error("step '{0}' has no implementation")]
    MissingStep(String),

    #[error("step '{0}' was added twice")]
    DuplicateStep(String),

    #[error("step '{0}' has no outgoing edge")]
    MissingEdge(String),

    #[error("step '{0}' has more than one outgoing edge")]
    DuplicateEdge(String),

    #[error("workflow '{0}' is already registered")]
    DuplicateWorkflow(String),
}

/// Errors raised by the engine
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Workflow definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("No pending interrupt for thread '{thread_id}'")]
    NoPendingInterrupt { thread_id: String },

    #[error(
        "Stale checkpoint for thread '{thread_id}': expected sequence {expected:?}, found {found:?}"
    )]
    StaleCheckpoint {
        thread_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Storage error: {0}")]
    Storage(CheckpointError),

    #[error("Step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    /// The pending interrupt is left untouched
    #[error("Invalid resume value for step '{step}': {message}")]
    InvalidResumeValue { step: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Thread '{0}' already exists")]
    ThreadExists(String),

    #[error("Thread '{0}' not found")]
    ThreadNotFound(String),

    #[error("Thread '{0}' is paused awaiting a decision")]
    ThreadPaused(String),

    #[error("Thread '{0}' has already completed")]
    ThreadCompleted(String),

    #[error("Checkpoint of thread '{thread_id}' does not fit workflow '{workflow}': {reason}")]
    IncompatibleCheckpoint {
        thread_id: String,
        workflow: String,
        reason: String,
    },

    #[error("Thread '{thread_id}' exceeded the limit of {limit} steps per run")]
    StepLimitExceeded { thread_id: String, limit: usize },

    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),
}

impl GraphError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::Definition(_) => "definition_error",
            GraphError::NoPendingInterrupt { .. } => "no_pending_interrupt",
            GraphError::StaleCheckpoint { .. } => "stale_checkpoint",
            GraphError::Storage(_) => "storage_error",
            GraphError::StepExecution { .. } => "step_execution_error",
            GraphError::InvalidResumeValue { .. } => "invalid_resume_value",
            GraphError::InvalidInput(_) => "invalid_input",
            GraphError::ThreadExists(_) => "thread_exists",
            GraphError::ThreadNotFound(_) => "thread_not_found",
            GraphError::ThreadPaused(_) => "thread_paused",
            GraphError::ThreadCompleted(_) => "thread_completed",
            GraphError::IncompatibleCheckpoint { .. } => "incompatible_checkpoint",
            GraphError::StepLimitExceeded { .. } => "step_limit_exceeded",
            GraphError::UnknownWorkflow(_) => "unknown_workflow",
        }
    }

    pub(crate) fn step_failed(step: &str, message: impl ToString) -> Self {
        GraphError::StepExecution {
            step: step.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<CheckpointError> for GraphError {
    fn from(error: CheckpointError) -> Self {
        match error {
            CheckpointError::Stale {
                thread_id,
                expected,
                found,
            } => GraphError::StaleCheckpoint {
                thread_id,
                expected,
                found,
            },
            other => GraphError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_store_error_maps_to_stale_checkpoint() {
        let err: GraphError = CheckpointError::Stale {
            thread_id: "t".into(),
            expected: Some(1),
            found: Some(2),
        }
        .into();
        assert_eq!(err.kind(), "stale_checkpoint");

        let err: GraphError = CheckpointError::Storage("disk full".into()).into();
        assert_eq!(err.kind(), "storage_error");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_definition_error_display() {
        let err = GraphError::from(DefinitionError::MissingEdge("review".into()));
        assert_eq!(err.kind(), "definition_error");
        assert_eq!(
            err.to_string(),
            "Workflow definition error: step 'review' has no outgoing edge"
        );
    }
}
