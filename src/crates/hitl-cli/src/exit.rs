//! Exit codes
//!
//! | Code | Meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | anything not listed below |
//! | 2 | usage error or bad input |
//! | 3 | no pending interrupt |
//! | 4 | storage failure |
//! | 5 | workflow definition error |
//! | 6 | stale checkpoint |
//! | 7 | step execution failure |
//! | 8 | invalid resume value |
//! | 9 | thread state conflict |

use hitl_checkpoint::CheckpointError;
use hitl_core::GraphError;
use hitl_server::{ConfigError, ServerError};
use serde::Serialize;

use crate::CliError;

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;
pub const USAGE: u8 = 2;
pub const NO_PENDING_INTERRUPT: u8 = 3;
pub const STORAGE: u8 = 4;
pub const DEFINITION: u8 = 5;
pub const STALE_CHECKPOINT: u8 = 6;
pub const STEP_FAILED: u8 = 7;
pub const INVALID_RESUME: u8 = 8;
pub const THREAD_CONFLICT: u8 = 9;

pub fn graph_exit_code(error: &GraphError) -> u8 {
    match error {
        GraphError::Definition(_) => DEFINITION,
        GraphError::NoPendingInterrupt { .. } => NO_PENDING_INTERRUPT,
        GraphError::StaleCheckpoint { .. } => STALE_CHECKPOINT,
        GraphError::Storage(inner) => checkpoint_exit_code(inner),
        GraphError::StepExecution { .. } | GraphError::StepLimitExceeded { .. } => STEP_FAILED,
        GraphError::InvalidResumeValue { .. } => INVALID_RESUME,
        GraphError::InvalidInput(_) | GraphError::UnknownWorkflow(_) => USAGE,
        GraphError::ThreadExists(_)
        | GraphError::ThreadNotFound(_)
        | GraphError::ThreadPaused(_)
        | GraphError::ThreadCompleted(_)
        | GraphError::IncompatibleCheckpoint { .. } => THREAD_CONFLICT,
    }
}

fn checkpoint_exit_code(error: &CheckpointError) -> u8 {
    if error.is_stale() {
        STALE_CHECKPOINT
    } else {
        STORAGE
    }
}

/// Exit code for an error anywhere in `error`'s chain.
///
/// The first cause that belongs to a known category decides.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<GraphError>() {
            return graph_exit_code(e);
        }
        if let Some(e) = cause.downcast_ref::<ServerError>() {
            return match e {
                ServerError::Graph(inner) => graph_exit_code(inner),
                ServerError::Storage(inner) => checkpoint_exit_code(inner),
                ServerError::Config(_) => USAGE,
                ServerError::Io(_) => FAILURE,
            };
        }
        if let Some(e) = cause.downcast_ref::<CheckpointError>() {
            return checkpoint_exit_code(e);
        }
        if cause.is::<ConfigError>() || cause.is::<CliError>() {
            return USAGE;
        }
    }
    FAILURE
}

/// Error report written to stderr
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub status: &'static str,
    pub kind: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl ErrorReport {
    pub fn new(error: &anyhow::Error) -> Self {
        Self {
            status: "error",
            kind: kind(error),
            message: format!("{error:#}"),
            exit_code: exit_code(error),
        }
    }
}

fn kind(error: &anyhow::Error) -> &'static str {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<GraphError>() {
            return e.kind();
        }
        if let Some(ServerError::Graph(e)) = cause.downcast_ref::<ServerError>() {
            return e.kind();
        }
        if cause.is::<CheckpointError>() || cause.is::<ServerError>() {
            return "storage_error";
        }
        if cause.is::<ConfigError>() {
            return "config_error";
        }
        if cause.is::<CliError>() {
            return "bad_input";
        }
    }
    "internal_error"
}
