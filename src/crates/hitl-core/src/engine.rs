//! Step executor and resumption protocol
//!
//! The [`Engine`] runs a [`Workflow`] one step at a time against a
//! [`CheckpointStore`]. After every completed step it appends a checkpoint,
//! so a crash or a failed step leaves the thread at the last good position.
//!
//! ```text
//!  start ─▶ [step] ─▶ put ─▶ [step] ─▶ put ─▶ ... ─▶ Completed
//!                               │
//!                         interrupt(payload)
//!                               ▼
//!                     put(paused) ─▶ Paused { interrupt }
//!                                        │
//!              resume(value) ◀───────────┘   (any process, any time later)
//!                   │
//!                   ▼
//!        re-enter suspended step with value in its resume slot
//! ```
//!
//! Operations on one thread are serialised by an in-process lock; writers in
//! other processes are kept out by the store's sequence check, which surfaces
//! as [`GraphError::StaleCheckpoint`].

use crate::error::{GraphError, Result};
use crate::graph::{InputPolicy, Workflow};
use crate::interrupt::{StepContext, StepError};
use crate::locks::ThreadLocks;
use crate::state::{type_name, WorkflowState};
use crate::step::{Next, StepKey};
use chrono::{DateTime, Utc};
use hitl_checkpoint::{
    Checkpoint, CheckpointSource, CheckpointStore, InterruptWhen, PendingInterrupt, ThreadStatus,
    ThreadSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Guard against routing loops that never reach the end or an interrupt
    pub max_steps_per_run: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps_per_run: 100,
        }
    }
}

/// Outcome of `start`, `resume` and `proceed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunResult {
    Completed {
        thread_id: String,
        sequence: u64,
        state: WorkflowState,
    },
    Paused {
        thread_id: String,
        sequence: u64,
        interrupt: PendingInterrupt,
    },
}

impl RunResult {
    pub fn thread_id(&self) -> &str {
        match self {
            RunResult::Completed { thread_id, .. } | RunResult::Paused { thread_id, .. } => thread_id,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            RunResult::Completed { sequence, .. } | RunResult::Paused { sequence, .. } => *sequence,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, RunResult::Paused { .. })
    }

    pub fn interrupt(&self) -> Option<&PendingInterrupt> {
        match self {
            RunResult::Paused { interrupt, .. } => Some(interrupt),
            RunResult::Completed { .. } => None,
        }
    }

    pub fn state(&self) -> Option<&WorkflowState> {
        match self {
            RunResult::Completed { state, .. } => Some(state),
            RunResult::Paused { .. } => None,
        }
    }

    fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        match checkpoint.pending_interrupt {
            Some(interrupt) => RunResult::Paused {
                thread_id: checkpoint.thread_id,
                sequence: checkpoint.sequence,
                interrupt,
            },
            None => RunResult::Completed {
                thread_id: checkpoint.thread_id,
                sequence: checkpoint.sequence,
                state: checkpoint.state,
            },
        }
    }
}

/// Read-only view of a thread's latest checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub thread_id: String,
    pub workflow: String,
    pub sequence: u64,
    pub status: ThreadStatus,
    pub state: WorkflowState,
    pub next_step: Option<String>,
    pub pending_interrupt: Option<PendingInterrupt>,
    pub updated_at: DateTime<Utc>,
}

impl From<Checkpoint> for ThreadSnapshot {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            status: checkpoint.status(),
            thread_id: checkpoint.thread_id,
            workflow: checkpoint.workflow,
            sequence: checkpoint.sequence,
            state: checkpoint.state,
            next_step: checkpoint.next_step,
            pending_interrupt: checkpoint.pending_interrupt,
            updated_at: checkpoint.created_at,
        }
    }
}

/// Pending decision of a paused thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingView {
    pub thread_id: String,
    pub workflow: String,
    pub sequence: u64,
    pub interrupt: PendingInterrupt,
}

/// The step about to execute, not yet persisted
struct Cursor {
    step: String,
    state: WorkflowState,
    resume_values: Vec<Value>,
    /// Source recorded on the checkpoint this step produces
    source: CheckpointSource,
}

impl Cursor {
    fn at(checkpoint: &Checkpoint, step: String) -> Self {
        Self {
            step,
            state: checkpoint.state.clone(),
            resume_values: checkpoint.resume_values.clone(),
            source: CheckpointSource::Step,
        }
    }
}

/// Executes workflows against a checkpoint store
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn CheckpointStore>,
    locks: Arc<ThreadLocks>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish()
    }
}

impl Engine {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn CheckpointStore>, config: EngineConfig) -> Self {
        Self {
            store,
            locks: Arc::new(ThreadLocks::new()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Per-thread locks shared by all clones of this engine
    pub fn locks(&self) -> &ThreadLocks {
        &self.locks
    }

    /// Begin a run on `thread_id` with `input` merged into an empty state.
    ///
    /// An existing thread is rejected with [`GraphError::ThreadExists`]
    /// unless the workflow uses [`InputPolicy::Merge`].
    pub async fn start<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        thread_id: &str,
        input: Value,
    ) -> Result<RunResult> {
        validate_thread_id(thread_id)?;
        if !matches!(input, Value::Null | Value::Object(_)) {
            return Err(GraphError::InvalidInput(format!(
                "input must be an object, got {}",
                type_name(&input)
            )));
        }

        let _guard = self.locks.lock(thread_id).await;
        let latest = self.store.get_latest(thread_id).await?;

        let Some(latest) = latest else {
            let mut state = WorkflowState::new();
            apply_input(workflow, &mut state, &input)?;

            let start = workflow.start();
            let checkpoint = enter(
                workflow,
                Checkpoint::initial(thread_id, workflow.name(), state, None),
                Next::Step(start),
            );
            self.store.put(&checkpoint, None).await?;
            info!(thread_id = %thread_id, workflow = %workflow.name(), "Thread started");
            return self.run(workflow, checkpoint, None).await;
        };

        ensure_workflow(workflow, &latest)?;
        match workflow.input_policy() {
            InputPolicy::FreshOnly => Err(GraphError::ThreadExists(thread_id.to_string())),
            InputPolicy::Merge if latest.is_paused() => {
                debug!(thread_id = %thread_id, "Input on paused thread treated as decision");
                let mut state = latest.state.clone();
                // A breakpoint resume merges the value itself
                let at_breakpoint = latest
                    .pending_interrupt
                    .as_ref()
                    .map_or(false, |p| p.when == InterruptWhen::Before);
                if !at_breakpoint {
                    apply_input(workflow, &mut state, &input)?;
                }
                self.apply_resume(workflow, latest, state, input).await
            }
            InputPolicy::Merge => {
                let mut state = latest.state.clone();
                apply_input(workflow, &mut state, &input)?;
                let checkpoint = enter(
                    workflow,
                    latest
                        .successor(CheckpointSource::Input)
                        .with_state(state)
                        .with_resume_values(Vec::new()),
                    Next::Step(workflow.start()),
                );
                self.store.put(&checkpoint, Some(latest.sequence)).await?;
                info!(thread_id = %thread_id, sequence = checkpoint.sequence, "Thread restarted with merged input");
                self.run(workflow, checkpoint, None).await
            }
        }
    }

    /// Supply the decision for a paused thread and continue
    pub async fn resume<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        thread_id: &str,
        value: Value,
    ) -> Result<RunResult> {
        self.resume_inner(workflow, thread_id, value, None).await
    }

    /// [`resume`](Self::resume), rejected unless the thread is still at
    /// `expected_sequence`
    pub async fn resume_checked<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        thread_id: &str,
        value: Value,
        expected_sequence: u64,
    ) -> Result<RunResult> {
        self.resume_inner(workflow, thread_id, value, Some(expected_sequence))
            .await
    }

    async fn resume_inner<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        thread_id: &str,
        value: Value,
        expected_sequence: Option<u64>,
    ) -> Result<RunResult> {
        let _guard = self.locks.lock(thread_id).await;
        let latest = self
            .store
            .get_latest(thread_id)
            .await?
            .ok_or_else(|| GraphError::NoPendingInterrupt {
                thread_id: thread_id.to_string(),
            })?;
        ensure_workflow(workflow, &latest)?;

        if let Some(expected) = expected_sequence {
            if expected != latest.sequence {
                warn!(thread_id = %thread_id, expected, found = latest.sequence, "Resume against stale checkpoint");
                return Err(GraphError::StaleCheckpoint {
                    thread_id: thread_id.to_string(),
                    expected: Some(expected),
                    found: Some(latest.sequence),
                });
            }
        }
        if !latest.is_paused() {
            return Err(GraphError::NoPendingInterrupt {
                thread_id: thread_id.to_string(),
            });
        }

        let state = latest.state.clone();
        self.apply_resume(workflow, latest, state, value).await
    }

    async fn apply_resume<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        latest: Checkpoint,
        mut state: WorkflowState,
        value: Value,
    ) -> Result<RunResult> {
        let pending = latest
            .pending_interrupt
            .clone()
            .ok_or_else(|| GraphError::NoPendingInterrupt {
                thread_id: latest.thread_id.clone(),
            })?;

        let resume_values = match pending.when {
            InterruptWhen::Within => {
                let mut values = latest.resume_values.clone();
                values.push(value);
                values
            }
            InterruptWhen::Before => {
                match &value {
                    Value::Null | Value::Object(_) => {}
                    other => {
                        return Err(GraphError::InvalidResumeValue {
                            step: pending.step.clone(),
                            message: format!(
                                "breakpoint resume takes null or a state update object, got {}",
                                type_name(other)
                            ),
                        })
                    }
                }
                workflow.schema().apply(&mut state, &value).map_err(|e| {
                    GraphError::InvalidResumeValue {
                        step: pending.step.clone(),
                        message: e.to_string(),
                    }
                })?;
                Vec::new()
            }
        };

        info!(
            thread_id = %latest.thread_id,
            step = %pending.step,
            interrupt_id = %pending.id,
            "Resuming thread"
        );

        let cursor = Cursor {
            step: pending.step,
            state,
            resume_values,
            source: CheckpointSource::Resume,
        };
        self.run(workflow, latest, Some(cursor)).await
    }

    /// Continue a thread that is neither paused nor completed
    pub async fn proceed<K: StepKey>(&self, workflow: &Workflow<K>, thread_id: &str) -> Result<RunResult> {
        let _guard = self.locks.lock(thread_id).await;
        let latest = self.load(thread_id).await?;
        ensure_workflow(workflow, &latest)?;

        match latest.status() {
            ThreadStatus::Paused => Err(GraphError::ThreadPaused(thread_id.to_string())),
            ThreadStatus::Completed => Err(GraphError::ThreadCompleted(thread_id.to_string())),
            ThreadStatus::Ready => self.run(workflow, latest, None).await,
        }
    }

    /// Merge `values` into the latest state from outside the workflow.
    ///
    /// With `as_step`, the update is treated as that step's output: any
    /// pending interrupt is dropped and the cursor moves to wherever the
    /// router sends `as_step`. Without it, only the state changes.
    pub async fn update_state<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        thread_id: &str,
        values: Value,
        as_step: Option<K>,
    ) -> Result<ThreadSnapshot> {
        let _guard = self.locks.lock(thread_id).await;
        let latest = self.load(thread_id).await?;
        ensure_workflow(workflow, &latest)?;

        let mut state = latest.state.clone();
        apply_input(workflow, &mut state, &values)?;

        let checkpoint = match as_step {
            Some(step) => {
                let next = workflow.route(step, &state);
                enter(
                    workflow,
                    latest
                        .successor(CheckpointSource::Update)
                        .with_state(state)
                        .with_resume_values(Vec::new()),
                    next,
                )
            }
            None => latest.successor(CheckpointSource::Update).with_state(state),
        };

        self.store.put(&checkpoint, Some(latest.sequence)).await?;
        info!(
            thread_id = %thread_id,
            as_step = ?as_step.map(|s| s.name()),
            sequence = checkpoint.sequence,
            "State updated"
        );
        Ok(checkpoint.into())
    }

    /// Pending decision of `thread_id`, if it is paused
    pub async fn pending(&self, thread_id: &str) -> Result<Option<PendingView>> {
        let latest = self.store.get_latest(thread_id).await?;
        Ok(latest.and_then(|checkpoint| {
            let Checkpoint {
                thread_id,
                workflow,
                sequence,
                pending_interrupt,
                ..
            } = checkpoint;
            pending_interrupt.map(|interrupt| PendingView {
                thread_id,
                workflow,
                sequence,
                interrupt,
            })
        }))
    }

    pub async fn snapshot(&self, thread_id: &str) -> Result<ThreadSnapshot> {
        Ok(self.load(thread_id).await?.into())
    }

    /// Checkpoints of a thread, newest first
    pub async fn history(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Checkpoint>> {
        if self.store.latest_sequence(thread_id).await?.is_none() {
            return Err(GraphError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(self.store.list(thread_id, limit).await?)
    }

    pub async fn threads(&self) -> Result<Vec<ThreadSummary>> {
        Ok(self.store.list_threads().await?)
    }

    /// Remove a thread and all its checkpoints
    pub async fn delete_thread(&self, thread_id: &str) -> Result<u64> {
        let removed = {
            let _guard = self.locks.lock(thread_id).await;
            self.store.delete_thread(thread_id).await?
        };
        if removed == 0 {
            return Err(GraphError::ThreadNotFound(thread_id.to_string()));
        }
        info!(thread_id = %thread_id, removed, "Thread deleted");
        Ok(removed)
    }

    async fn load(&self, thread_id: &str) -> Result<Checkpoint> {
        self.store
            .get_latest(thread_id)
            .await?
            .ok_or_else(|| GraphError::ThreadNotFound(thread_id.to_string()))
    }

    /// Drive the thread forward from `last` (already persisted).
    ///
    /// `cursor` overrides the first step's inputs; it is how a resume runs
    /// the suspended step with a decision that is not yet persisted, so a
    /// rejected decision leaves the paused checkpoint in place.
    async fn run<K: StepKey>(
        &self,
        workflow: &Workflow<K>,
        mut last: Checkpoint,
        mut cursor: Option<Cursor>,
    ) -> Result<RunResult> {
        let thread_id = last.thread_id.clone();
        let mut steps_run = 0usize;

        loop {
            let current = match cursor.take() {
                Some(cursor) => cursor,
                None => {
                    if last.is_paused() {
                        return Ok(RunResult::from_checkpoint(last));
                    }
                    match last.next_step.clone() {
                        Some(step) => Cursor::at(&last, step),
                        None => {
                            info!(thread_id = %thread_id, sequence = last.sequence, "Thread completed");
                            return Ok(RunResult::from_checkpoint(last));
                        }
                    }
                }
            };

            if steps_run >= self.config.max_steps_per_run {
                warn!(thread_id = %thread_id, limit = self.config.max_steps_per_run, "Step limit exceeded");
                return Err(GraphError::StepLimitExceeded {
                    thread_id,
                    limit: self.config.max_steps_per_run,
                });
            }

            let key = K::from_name(&current.step).ok_or_else(|| GraphError::IncompatibleCheckpoint {
                thread_id: thread_id.clone(),
                workflow: workflow.name().to_string(),
                reason: format!("unknown step '{}'", current.step),
            })?;
            let step = workflow.step_fn(key).ok_or_else(|| GraphError::IncompatibleCheckpoint {
                thread_id: thread_id.clone(),
                workflow: workflow.name().to_string(),
                reason: format!("step '{}' has no implementation", current.step),
            })?;

            debug!(thread_id = %thread_id, step = %current.step, resume_slots = current.resume_values.len(), "Running step");
            let ctx = StepContext::new(
                thread_id.clone(),
                current.step.clone(),
                current.state.clone(),
                current.resume_values.clone(),
            );
            steps_run += 1;

            match step(ctx).await {
                Ok(update) => {
                    let mut state = current.state;
                    workflow.schema().apply(&mut state, &update).map_err(|e| {
                        GraphError::step_failed(&current.step, format!("invalid update: {}", e))
                    })?;

                    let next = workflow.route(key, &state);
                    let checkpoint = enter(
                        workflow,
                        last.successor(current.source)
                            .with_state(state)
                            .with_resume_values(Vec::new()),
                        next,
                    );
                    self.store.put(&checkpoint, Some(last.sequence)).await?;
                    info!(
                        thread_id = %thread_id,
                        step = %current.step,
                        next = ?next.name(),
                        sequence = checkpoint.sequence,
                        "Step completed"
                    );
                    last = checkpoint;
                }
                Err(StepError::Suspended(interrupt)) => {
                    let pending = PendingInterrupt::within(&current.step, interrupt.index, interrupt.payload);
                    let checkpoint = last
                        .successor(CheckpointSource::Interrupt)
                        .with_state(current.state)
                        .with_next_step(Some(current.step.clone()))
                        .with_resume_values(current.resume_values)
                        .with_pending(Some(pending));
                    self.store.put(&checkpoint, Some(last.sequence)).await?;
                    info!(
                        thread_id = %thread_id,
                        step = %current.step,
                        index = interrupt.index,
                        sequence = checkpoint.sequence,
                        "Thread paused for decision"
                    );
                    return Ok(RunResult::from_checkpoint(checkpoint));
                }
                Err(StepError::InvalidResume(message)) => {
                    warn!(thread_id = %thread_id, step = %current.step, %message, "Resume value rejected");
                    return Err(GraphError::InvalidResumeValue {
                        step: current.step,
                        message,
                    });
                }
                Err(StepError::Failed(message)) => {
                    warn!(thread_id = %thread_id, step = %current.step, %message, "Step failed");
                    return Err(GraphError::StepExecution {
                        step: current.step,
                        message,
                    });
                }
            }
        }
    }
}

/// Position `checkpoint` at `next`, pausing first if `next` is a breakpoint
fn enter<K: StepKey>(workflow: &Workflow<K>, checkpoint: Checkpoint, next: Next<K>) -> Checkpoint {
    let checkpoint = checkpoint.with_next_step(next.name().map(str::to_string));
    match next.step() {
        Some(key) if workflow.is_breakpoint(key) => {
            let payload = json!({
                "type": "breakpoint",
                "step": key.name(),
                "state": Value::Object(checkpoint.state.clone()),
            });
            checkpoint.with_pending(Some(PendingInterrupt::before(key.name(), payload)))
        }
        _ => checkpoint.with_pending(None),
    }
}

fn apply_input<K: StepKey>(workflow: &Workflow<K>, state: &mut WorkflowState, input: &Value) -> Result<()> {
    workflow
        .schema()
        .apply(state, input)
        .map_err(|e| GraphError::InvalidInput(e.to_string()))
}

fn ensure_workflow<K: StepKey>(workflow: &Workflow<K>, checkpoint: &Checkpoint) -> Result<()> {
    if checkpoint.workflow != workflow.name() {
        return Err(GraphError::IncompatibleCheckpoint {
            thread_id: checkpoint.thread_id.clone(),
            workflow: workflow.name().to_string(),
            reason: format!("thread belongs to workflow '{}'", checkpoint.workflow),
        });
    }
    Ok(())
}

fn validate_thread_id(thread_id: &str) -> Result<()> {
    if thread_id.trim().is_empty() {
        return Err(GraphError::InvalidInput("thread_id must not be empty".to_string()));
    }
    Ok(())
}
