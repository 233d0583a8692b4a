//! The suspension point
//!
//! A step asks for an external decision by calling
//! [`StepContext::interrupt`]. On first execution there is no answer yet, so
//! the call returns `Err(StepError::Suspended(..))`; the step propagates it
//! with `?` and the engine persists a paused checkpoint carrying the payload.
//!
//! When a decision arrives the engine re-enters the same step with the
//! decision recorded in the step's resume slots. Suspension points are
//! matched by call order: the n-th `interrupt` call in a step invocation
//! returns the n-th recorded decision. Everything before the suspension point
//! runs again on re-entry, so it must be free of side effects that cannot be
//! repeated.
//!
//! ```rust,ignore
//! builder.add_step(Steps::Approval, |ctx: StepContext| async move {
//!     let proposal = ctx.require_str("proposal")?.to_string();
//!     let decision = ctx.interrupt_for_decision(json!({
//!         "message": "Approve deployment?",
//!         "proposal": proposal,
//!     }))?;
//!     Ok(json!({"approved": decision.approved}))
//! });
//! ```

use crate::state::{type_name, WorkflowState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// A suspension request raised by a step
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupt {
    /// Ordinal of the suspension point inside the step
    pub index: usize,
    pub payload: Value,
}

/// How a step invocation can end other than with an update
#[derive(Debug, Error)]
pub enum StepError {
    #[error("suspended at interrupt {}", .0.index)]
    Suspended(Interrupt),

    /// The recorded decision does not have the expected shape
    #[error("invalid resume value: {0}")]
    InvalidResume(String),

    #[error("{0}")]
    Failed(String),
}

impl StepError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        StepError::Failed(message.to_string())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(error: serde_json::Error) -> Self {
        StepError::Failed(format!("serialization error: {}", error))
    }
}

/// Everything a step sees during one invocation
#[derive(Debug)]
pub struct StepContext {
    thread_id: String,
    step: String,
    state: WorkflowState,
    resume_values: Vec<Value>,
    cursor: AtomicUsize,
}

impl StepContext {
    pub fn new(
        thread_id: impl Into<String>,
        step: impl Into<String>,
        state: WorkflowState,
        resume_values: Vec<Value>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            step: step.into(),
            state,
            resume_values,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.state.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// String field that the step cannot do without
    pub fn require_str(&self, field: &str) -> Result<&str, StepError> {
        self.get_str(field)
            .ok_or_else(|| StepError::failed(format!("state field '{}' must be a string", field)))
    }

    /// Deserialize a state field
    pub fn field<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, StepError> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Decisions already recorded for this step
    pub fn resume_count(&self) -> usize {
        self.resume_values.len()
    }

    /// Suspend until an external decision is supplied, or return it if it
    /// already was.
    pub fn interrupt(&self, payload: Value) -> Result<Value, StepError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        match self.resume_values.get(index) {
            Some(value) => Ok(value.clone()),
            None => Err(StepError::Suspended(Interrupt { index, payload })),
        }
    }

    /// Like [`interrupt`](Self::interrupt), deserializing the decision
    pub fn interrupt_as<T: DeserializeOwned>(&self, payload: Value) -> Result<T, StepError> {
        let value = self.interrupt(payload)?;
        serde_json::from_value(value).map_err(|e| StepError::InvalidResume(e.to_string()))
    }

    /// Suspend for an approve/reject decision
    pub fn interrupt_for_decision(&self, payload: Value) -> Result<Decision, StepError> {
        let value = self.interrupt(payload)?;
        Decision::parse(&value).map_err(StepError::InvalidResume)
    }
}

/// An approver's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Decision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            suggestion: None,
        }
    }

    pub fn reject(suggestion: Option<String>) -> Self {
        Self {
            approved: false,
            suggestion,
        }
    }

    /// Accepts `"yes"`/`"no"`, booleans, or `{"approved": .., "suggestion": ..}`.
    ///
    /// Anything else is rejected rather than read as a refusal.
    pub fn parse(value: &Value) -> Result<Self, String> {
        match value {
            Value::Object(fields) => {
                let approved = fields
                    .get("approved")
                    .ok_or_else(|| "decision object needs an 'approved' field".to_string())
                    .and_then(parse_flag)?;
                let suggestion = match fields.get("suggestion") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) if s.trim().is_empty() => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => {
                        return Err(format!("'suggestion' must be a string, got {}", type_name(other)))
                    }
                };
                Ok(Self {
                    approved,
                    suggestion,
                })
            }
            other => parse_flag(other).map(|approved| Self {
                approved,
                suggestion: None,
            }),
        }
    }
}

fn parse_flag(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "approve" | "approved" | "true" => Ok(true),
            "no" | "n" | "reject" | "rejected" | "false" => Ok(false),
            _ => Err(format!("unrecognised decision '{}', expected yes or no", text)),
        },
        other => Err(format!(
            "decision must be yes/no, a boolean or an object, got {}",
            type_name(other)
        )),
    }
}
