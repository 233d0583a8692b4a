//! Collaborator errors
//!
//! Research, writing, brokerage and chat replies happen outside the engine.
//! Their failures are reported as [`CollaboratorError`] and surface to the
//! engine as a failed step, which leaves the thread at its last checkpoint.

use hitl_core::StepError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollaboratorError>;

#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Backend could not be reached or refused the call
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Broker refused the order
    #[error("Order rejected: {0}")]
    OrderRejected(String),
}

impl From<CollaboratorError> for StepError {
    fn from(error: CollaboratorError) -> Self {
        StepError::failed(error)
    }
}
