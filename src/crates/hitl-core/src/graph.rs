//! Validated workflow definitions
//!
//! A [`Workflow`] is produced by [`WorkflowBuilder::build`](crate::WorkflowBuilder::build)
//! and is immutable afterwards. It owns the step implementations, one edge
//! per step, the static breakpoints, and the state schema.

use crate::interrupt::{StepContext, StepError};
use crate::state::{StateSchema, WorkflowState};
use crate::step::{Next, StepKey};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by a step
pub type StepFuture = Pin<Box<dyn Future<Output = Result<Value, StepError>> + Send>>;

/// A step implementation: takes the invocation context, returns a partial update
pub type StepFn = Arc<dyn Fn(StepContext) -> StepFuture + Send + Sync>;

/// Routing function evaluated against the state after a step
pub type Router<K> = Arc<dyn Fn(&WorkflowState) -> Next<K> + Send + Sync>;

/// Outgoing edge of a step
#[derive(Clone)]
pub enum Edge<K> {
    Direct(Next<K>),
    Conditional(Router<K>),
}

impl<K: StepKey> Edge<K> {
    pub fn resolve(&self, state: &WorkflowState) -> Next<K> {
        match self {
            Edge::Direct(next) => *next,
            Edge::Conditional(router) => router(state),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for Edge<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(next) => f.debug_tuple("Direct").field(next).finish(),
            Edge::Conditional(_) => f.write_str("Conditional(<router>)"),
        }
    }
}

/// What `start` does when the thread already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputPolicy {
    /// Reject with `ThreadExists`
    #[default]
    FreshOnly,
    /// Merge the input into the thread. A paused thread is resumed with the
    /// input as the decision; any other thread runs again from the start step.
    Merge,
}

/// A validated, executable workflow
pub struct Workflow<K: StepKey> {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) start: K,
    pub(crate) steps: HashMap<K, StepFn>,
    pub(crate) edges: HashMap<K, Edge<K>>,
    pub(crate) breakpoints: HashSet<K>,
    pub(crate) schema: StateSchema,
    pub(crate) input_policy: InputPolicy,
}

impl<K: StepKey> Workflow<K> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn start(&self) -> K {
        self.start
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn input_policy(&self) -> InputPolicy {
        self.input_policy
    }

    pub fn is_breakpoint(&self, key: K) -> bool {
        self.breakpoints.contains(&key)
    }

    /// Evaluate the outgoing edge of `from` against `state`
    pub fn route(&self, from: K, state: &WorkflowState) -> Next<K> {
        // Every key has an edge after build()
        self.edges.get(&from).map_or(Next::End, |edge| edge.resolve(state))
    }

    pub(crate) fn step_fn(&self, key: K) -> Option<StepFn> {
        self.steps.get(&key).cloned()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        K::all().iter().map(StepKey::name).collect()
    }
}

impl<K: StepKey> fmt::Debug for Workflow<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("edges", &self.edges)
            .field("breakpoints", &self.breakpoints)
            .field("schema", &self.schema)
            .field("input_policy", &self.input_policy)
            .finish()
    }
}
