//! Request and response bodies

use hitl_core::{PendingInterrupt, PendingView, RunResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub workflow: String,

    /// Generated when absent
    #[serde(default)]
    pub thread_id: Option<String>,

    #[serde(default, alias = "initial_input")]
    pub input: Value,
}

/// `POST /resume/:thread_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub decision: Value,

    /// Reject the decision unless the thread is still at this sequence
    #[serde(default)]
    pub expected_sequence: Option<u64>,
}

/// `POST /threads/:thread_id/state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStateRequest {
    pub values: Value,

    #[serde(default)]
    pub as_step: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Outcome of start, resume and proceed.
///
/// `payload` is the pending decision for a paused thread and the final
/// state for a completed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub status: String,
    pub thread_id: String,
    pub sequence: u64,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<PendingInterrupt>,
}

impl From<RunResult> for RunResponse {
    fn from(result: RunResult) -> Self {
        match result {
            RunResult::Completed {
                thread_id,
                sequence,
                state,
            } => Self {
                status: "completed".to_string(),
                thread_id,
                sequence,
                payload: Value::Object(state),
                interrupt: None,
            },
            RunResult::Paused {
                thread_id,
                sequence,
                interrupt,
            } => Self {
                status: "paused".to_string(),
                thread_id,
                sequence,
                payload: interrupt.payload.clone(),
                interrupt: Some(interrupt),
            },
        }
    }
}

/// `GET /pending/:thread_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<PendingInterrupt>,
}

impl PendingResponse {
    pub fn none() -> Self {
        Self {
            status: "no pending".to_string(),
            thread_id: None,
            workflow: None,
            sequence: None,
            interrupt_payload: None,
            interrupt: None,
        }
    }
}

impl From<PendingView> for PendingResponse {
    fn from(view: PendingView) -> Self {
        Self {
            status: "paused".to_string(),
            thread_id: Some(view.thread_id),
            workflow: Some(view.workflow),
            sequence: Some(view.sequence),
            interrupt_payload: Some(view.interrupt.payload.clone()),
            interrupt: Some(view.interrupt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub thread_id: String,
    pub removed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
