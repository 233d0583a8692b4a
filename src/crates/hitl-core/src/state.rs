//! State schema and reducers
//!
//! Steps return partial updates. A [`StateSchema`] decides how each field of
//! an update folds into the accumulated [`WorkflowState`]: fields without an
//! explicit reducer are overwritten, list fields such as chat `messages`
//! usually use [`AppendReducer`].
//!
//! ```rust
//! use hitl_core::state::{AppendReducer, StateSchema};
//! use serde_json::json;
//!
//! let schema = StateSchema::new().with_field("messages", AppendReducer);
//! let mut state = json!({"messages": ["hi"], "turn": 1}).as_object().cloned().unwrap();
//!
//! schema.apply(&mut state, &json!({"messages": ["hello"], "turn": 2})).unwrap();
//! assert_eq!(state["messages"], json!(["hi", "hello"]));
//! assert_eq!(state["turn"], json!(2));
//! ```

pub use hitl_checkpoint::WorkflowState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reducer received values it cannot combine
    #[error("Reducer '{reducer}' failed on field '{field}': {message}")]
    ReducerError {
        reducer: String,
        field: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Folds an update into the current value of one field
pub trait Reducer: Send + Sync {
    /// `current` is `Null` when the field is absent
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String>;

    fn name(&self) -> &str;
}

/// Last write wins
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> std::result::Result<Value, String> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Concatenates arrays; a scalar update is pushed as one element
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        let mut items = match current {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => return Err(format!("current value is not a list: {}", other)),
        };
        match update {
            Value::Array(more) => items.extend(more.iter().cloned()),
            single => items.push(single.clone()),
        }
        Ok(Value::Array(items))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Shallow object merge, update keys win
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        match (current, update) {
            (Value::Object(current), Value::Object(update)) => {
                let mut merged = current.clone();
                for (key, value) in update {
                    merged.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(merged))
            }
            (Value::Null, Value::Object(update)) => Ok(Value::Object(update.clone())),
            _ => Err("merge requires object values".to_string()),
        }
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Numeric accumulation, integer precision kept when both sides are integers
#[derive(Debug, Clone, Copy, Default)]
pub struct SumReducer;

impl Reducer for SumReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        match (current, update) {
            (Value::Null, Value::Number(_)) => Ok(update.clone()),
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                    return a
                        .checked_add(b)
                        .map(Value::from)
                        .ok_or_else(|| "integer overflow".to_string());
                }
                match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => serde_json::Number::from_f64(a + b)
                        .map(Value::Number)
                        .ok_or_else(|| "sum is not a finite number".to_string()),
                    _ => Err("cannot add non-numeric values".to_string()),
                }
            }
            _ => Err("sum requires numeric values".to_string()),
        }
    }

    fn name(&self) -> &str {
        "sum"
    }
}

/// Per-field reducers for one workflow
#[derive(Clone, Default)]
pub struct StateSchema {
    fields: HashMap<String, Arc<dyn Reducer>>,
}

impl std::fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<(&String, &str)> =
            self.fields.iter().map(|(k, r)| (k, r.name())).collect();
        fields.sort();
        f.debug_struct("StateSchema").field("fields", &fields).finish()
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: impl Into<String>, reducer: impl Reducer + 'static) {
        self.fields.insert(field.into(), Arc::new(reducer));
    }

    pub fn with_field(mut self, field: impl Into<String>, reducer: impl Reducer + 'static) -> Self {
        self.add_field(field, reducer);
        self
    }

    pub fn reducer_name(&self, field: &str) -> &str {
        self.fields.get(field).map_or("overwrite", |r| r.name())
    }

    /// Fold an update into `state`.
    ///
    /// `update` must be an object or `null` (no change). On error `state` is
    /// left unmodified.
    pub fn apply(&self, state: &mut WorkflowState, update: &Value) -> Result<()> {
        let update = match update {
            Value::Null => return Ok(()),
            Value::Object(update) => update,
            other => {
                return Err(StateError::InvalidState(format!(
                    "update must be an object, got {}",
                    type_name(other)
                )))
            }
        };

        let mut reduced = Vec::with_capacity(update.len());
        for (field, value) in update {
            let current = state.get(field).unwrap_or(&Value::Null);
            let next = match self.fields.get(field) {
                Some(reducer) => reducer.reduce(current, value).map_err(|message| {
                    StateError::ReducerError {
                        reducer: reducer.name().to_string(),
                        field: field.clone(),
                        message,
                    }
                })?,
                None => value.clone(),
            };
            reduced.push((field.clone(), next));
        }

        state.extend(reduced);
        Ok(())
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
