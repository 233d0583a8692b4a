//! Checkpoint records for paused and running workflow threads
//!
//! A [`Checkpoint`] is an immutable snapshot of one thread: the accumulated
//! workflow state, the step to run next, and, when the thread is paused, the
//! [`PendingInterrupt`] awaiting an external decision.
//!
//! Checkpoints for a thread form an append-only chain ordered by
//! [`Checkpoint::sequence`]. The sequence doubles as the optimistic
//! concurrency version: a writer names the sequence it read, and the store
//! rejects the write if another writer got there first.
//!
//! ```text
//!  seq 0 (input)     seq 1 (step)      seq 2 (interrupt)     seq 3 (resume)
//!  next=search  ──▶  next=draft   ──▶  next=review       ──▶ next=finalize
//!                                      pending=Some(..)
//! ```
//!
//! # Example
//!
//! ```rust
//! use hitl_checkpoint::{Checkpoint, CheckpointSource, ThreadStatus};
//! use serde_json::json;
//!
//! let state = json!({"topic": "rust"}).as_object().cloned().unwrap();
//! let first = Checkpoint::initial("thread-1", "linkedin_post", state, Some("search_topic".into()));
//! assert_eq!(first.sequence, 0);
//!
//! let done = first.successor(CheckpointSource::Step).with_next_step(None);
//! assert_eq!(done.sequence, 1);
//! assert_eq!(done.status(), ThreadStatus::Completed);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Workflow state: a JSON object of named fields
pub type WorkflowState = serde_json::Map<String, Value>;

/// What produced a checkpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Initial input for a new run
    Input,
    /// A step completed
    Step,
    /// Execution suspended awaiting a decision
    Interrupt,
    /// A decision was recorded against a pending interrupt
    Resume,
    /// Manual state update from outside the workflow
    Update,
}

impl CheckpointSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointSource::Input => "input",
            CheckpointSource::Step => "step",
            CheckpointSource::Interrupt => "interrupt",
            CheckpointSource::Resume => "resume",
            CheckpointSource::Update => "update",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "input" => Some(CheckpointSource::Input),
            "step" => Some(CheckpointSource::Step),
            "interrupt" => Some(CheckpointSource::Interrupt),
            "resume" => Some(CheckpointSource::Resume),
            "update" => Some(CheckpointSource::Update),
            _ => None,
        }
    }
}

/// Where a pending interrupt was raised
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InterruptWhen {
    /// Static breakpoint before the step ran
    Before,
    /// Raised from inside the step body
    Within,
}

/// An unanswered request for an external decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingInterrupt {
    pub id: String,
    /// Step that is suspended
    pub step: String,
    /// Ordinal of the suspension point inside the step
    pub index: usize,
    pub when: InterruptWhen,
    /// Payload shown to the approver
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl PendingInterrupt {
    pub fn within(step: impl Into<String>, index: usize, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            step: step.into(),
            index,
            when: InterruptWhen::Within,
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn before(step: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            step: step.into(),
            index: 0,
            when: InterruptWhen::Before,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Derived lifecycle status of a thread
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    /// Waiting on a pending interrupt
    Paused,
    /// Reached the end of the workflow
    Completed,
    /// Between steps, neither paused nor finished
    Ready,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Paused => "paused",
            ThreadStatus::Completed => "completed",
            ThreadStatus::Ready => "ready",
        }
    }
}

/// Durable snapshot of one workflow thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,
    /// Name of the workflow definition that owns this thread
    pub workflow: String,
    pub sequence: u64,
    pub state: WorkflowState,
    /// `None` once the workflow has finished
    pub next_step: Option<String>,
    pub pending_interrupt: Option<PendingInterrupt>,
    /// Decisions already supplied to `next_step`, by suspension point index
    #[serde(default)]
    pub resume_values: Vec<Value>,
    pub source: CheckpointSource,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// First checkpoint of a thread
    pub fn initial(
        thread_id: impl Into<String>,
        workflow: impl Into<String>,
        state: WorkflowState,
        next_step: Option<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            workflow: workflow.into(),
            sequence: 0,
            state,
            next_step,
            pending_interrupt: None,
            resume_values: Vec::new(),
            source: CheckpointSource::Input,
            created_at: Utc::now(),
        }
    }

    /// Next checkpoint in the chain, carrying this one's fields forward
    pub fn successor(&self, source: CheckpointSource) -> Self {
        Self {
            thread_id: self.thread_id.clone(),
            workflow: self.workflow.clone(),
            sequence: self.sequence + 1,
            state: self.state.clone(),
            next_step: self.next_step.clone(),
            pending_interrupt: self.pending_interrupt.clone(),
            resume_values: self.resume_values.clone(),
            source,
            created_at: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: WorkflowState) -> Self {
        self.state = state;
        self
    }

    pub fn with_next_step(mut self, next_step: Option<String>) -> Self {
        self.next_step = next_step;
        self
    }

    pub fn with_pending(mut self, pending: Option<PendingInterrupt>) -> Self {
        self.pending_interrupt = pending;
        self
    }

    pub fn with_resume_values(mut self, values: Vec<Value>) -> Self {
        self.resume_values = values;
        self
    }

    pub fn status(&self) -> ThreadStatus {
        if self.pending_interrupt.is_some() {
            ThreadStatus::Paused
        } else if self.next_step.is_none() {
            ThreadStatus::Completed
        } else {
            ThreadStatus::Ready
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pending_interrupt.is_some()
    }
}

/// Latest position of a thread, as listed by a store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub workflow: String,
    pub latest_sequence: u64,
    pub status: ThreadStatus,
    pub next_step: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Checkpoint> for ThreadSummary {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            thread_id: checkpoint.thread_id.clone(),
            workflow: checkpoint.workflow.clone(),
            latest_sequence: checkpoint.sequence,
            status: checkpoint.status(),
            next_step: checkpoint.next_step.clone(),
            updated_at: checkpoint.created_at,
        }
    }
}
