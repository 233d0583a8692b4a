//! # hitl-core - Resumable human-in-the-loop workflows
//!
//! A workflow is a small state machine of async steps. Any step may stop and
//! ask an external approver for a decision; the engine persists the paused
//! thread and picks it up again, possibly in another process and much later,
//! exactly at the suspended step.
//!
//! ## Pieces
//!
//! - [`WorkflowBuilder`] / [`Workflow`] - steps keyed by a closed enum
//!   ([`StepKey`], usually declared with [`step_keys!`]), one edge per step,
//!   optional static breakpoints, a [`StateSchema`] of reducers
//! - [`StepContext::interrupt`] - the suspension point; see [`interrupt`]
//! - [`Engine`] - `start`, `resume`, `proceed`, `update_state` and read-only
//!   queries over a [`CheckpointStore`](hitl_checkpoint::CheckpointStore)
//! - [`WorkflowRegistry`] - name-based access for servers and CLIs
//!
//! ## Example
//!
//! ```rust
//! use hitl_checkpoint::InMemoryCheckpointStore;
//! use hitl_core::{step_keys, Engine, Next, StepContext, StepError, WorkflowBuilder};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! step_keys! {
//!     enum Steps {
//!         Approval => "approval",
//!     }
//! }
//!
//! async fn approval(ctx: StepContext) -> Result<Value, StepError> {
//!     let decision = ctx.interrupt_for_decision(json!({"message": "Approve deployment?"}))?;
//!     Ok(json!({"approved": decision.approved}))
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> hitl_core::Result<()> {
//! let workflow = WorkflowBuilder::new("deploy")
//!     .add_step(Steps::Approval, approval)
//!     .add_edge(Steps::Approval, Next::End)
//!     .set_start(Steps::Approval)
//!     .build()?;
//!
//! let engine = Engine::new(Arc::new(InMemoryCheckpointStore::new()));
//!
//! let paused = engine.start(&workflow, "thread-1", json!({})).await?;
//! assert!(paused.is_paused());
//!
//! let done = engine.resume(&workflow, "thread-1", json!("yes")).await?;
//! assert_eq!(done.state().unwrap()["approved"], json!(true));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod locks;
pub mod registry;
pub mod state;
pub mod step;

pub use builder::WorkflowBuilder;
pub use engine::{Engine, EngineConfig, PendingView, RunResult, ThreadSnapshot};
pub use error::{DefinitionError, GraphError, Result};
pub use graph::{Edge, InputPolicy, Router, StepFn, StepFuture, Workflow};
pub use interrupt::{Decision, Interrupt, StepContext, StepError};
pub use locks::{ThreadGuard, ThreadLocks};
pub use registry::{WorkflowHandle, WorkflowInfo, WorkflowRegistry};
pub use state::{
    AppendReducer, MergeReducer, OverwriteReducer, Reducer, StateError, StateSchema, SumReducer,
    WorkflowState,
};
pub use step::{Next, StepKey};

pub use hitl_checkpoint::{
    Checkpoint, CheckpointSource, InterruptWhen, PendingInterrupt, ThreadStatus, ThreadSummary,
};
