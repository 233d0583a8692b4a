//! API errors and their JSON form
//!
//! Every failure is answered with `{"status": "error", "kind", "message"}`,
//! where `kind` is the engine's stable error kind.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hitl_core::GraphError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Request body or query could not be read
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Graph(error) => match error {
                GraphError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                GraphError::ThreadNotFound(_) | GraphError::UnknownWorkflow(_) => {
                    StatusCode::NOT_FOUND
                }
                GraphError::NoPendingInterrupt { .. }
                | GraphError::StaleCheckpoint { .. }
                | GraphError::ThreadExists(_)
                | GraphError::ThreadPaused(_)
                | GraphError::ThreadCompleted(_)
                | GraphError::IncompatibleCheckpoint { .. } => StatusCode::CONFLICT,
                GraphError::InvalidResumeValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                GraphError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                GraphError::Definition(_)
                | GraphError::StepExecution { .. }
                | GraphError::StepLimitExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Graph(error) => error.kind(),
            ApiError::BadRequest(_) => "bad_request",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: "error".to_string(),
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(kind = %body.kind, message = %body.message, "Request failed");
        } else {
            tracing::warn!(kind = %body.kind, message = %body.message, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
