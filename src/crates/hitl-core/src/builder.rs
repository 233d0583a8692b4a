//! Fluent construction of workflows
//!
//! ```rust
//! use hitl_core::{step_keys, Next, StepContext, WorkflowBuilder};
//! use serde_json::json;
//!
//! step_keys! {
//!     enum Steps {
//!         Propose => "propose",
//!         Approve => "approve",
//!     }
//! }
//!
//! let workflow = WorkflowBuilder::new("proposal")
//!     .add_step(Steps::Propose, |_ctx: StepContext| async move {
//!         Ok(json!({"proposal": "ship it"}))
//!     })
//!     .add_step(Steps::Approve, |ctx: StepContext| async move {
//!         let decision = ctx.interrupt_for_decision(json!({"proposal": ctx.get("proposal")}))?;
//!         Ok(json!({"approved": decision.approved}))
//!     })
//!     .add_edge(Steps::Propose, Steps::Approve)
//!     .add_edge(Steps::Approve, Next::End)
//!     .set_start(Steps::Propose)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(workflow.step_names(), vec!["propose", "approve"]);
//! ```

use crate::error::DefinitionError;
use crate::graph::{Edge, InputPolicy, StepFn, Workflow};
use crate::interrupt::{StepContext, StepError};
use crate::state::{Reducer, StateSchema, WorkflowState};
use crate::step::{Next, StepKey};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// Builder for [`Workflow`]
pub struct WorkflowBuilder<K: StepKey> {
    name: String,
    description: String,
    start: Option<K>,
    steps: HashMap<K, StepFn>,
    edges: HashMap<K, Edge<K>>,
    breakpoints: HashSet<K>,
    schema: StateSchema,
    input_policy: InputPolicy,
    errors: Vec<DefinitionError>,
}

impl<K: StepKey> WorkflowBuilder<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            start: None,
            steps: HashMap::new(),
            edges: HashMap::new(),
            breakpoints: HashSet::new(),
            schema: StateSchema::new(),
            input_policy: InputPolicy::default(),
            errors: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Register a reducer for one state field
    pub fn reducer(mut self, field: impl Into<String>, reducer: impl Reducer + 'static) -> Self {
        self.schema.add_field(field, reducer);
        self
    }

    pub fn add_step<F, Fut>(mut self, key: K, step: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, StepError>> + Send + 'static,
    {
        let step: StepFn = Arc::new(move |ctx| Box::pin(step(ctx)));
        if self.steps.insert(key, step).is_some() {
            self.errors
                .push(DefinitionError::DuplicateStep(key.name().to_string()));
        }
        self
    }

    pub fn add_edge(self, from: K, to: impl Into<Next<K>>) -> Self {
        self.insert_edge(from, Edge::Direct(to.into()))
    }

    /// Route with a function of the state after `from` completes
    pub fn add_conditional_edge<R>(self, from: K, router: R) -> Self
    where
        R: Fn(&WorkflowState) -> Next<K> + Send + Sync + 'static,
    {
        self.insert_edge(from, Edge::Conditional(Arc::new(router)))
    }

    pub fn set_start(mut self, key: K) -> Self {
        self.start = Some(key);
        self
    }

    /// Pause whenever execution moves into `key`, before it runs
    pub fn interrupt_before(mut self, key: K) -> Self {
        self.breakpoints.insert(key);
        self
    }

    pub fn input_policy(mut self, policy: InputPolicy) -> Self {
        self.input_policy = policy;
        self
    }

    fn insert_edge(mut self, from: K, edge: Edge<K>) -> Self {
        if self.edges.insert(from, edge).is_some() {
            self.errors
                .push(DefinitionError::DuplicateEdge(from.name().to_string()));
        }
        self
    }

    /// Validate and freeze the definition
    pub fn build(self) -> Result<Workflow<K>, DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        let start = self.start.ok_or(DefinitionError::MissingStart)?;

        for key in K::all() {
            if !self.steps.contains_key(key) {
                return Err(DefinitionError::MissingStep(key.name().to_string()));
            }
            if !self.edges.contains_key(key) {
                return Err(DefinitionError::MissingEdge(key.name().to_string()));
            }
        }

        Ok(Workflow {
            name: self.name,
            description: self.description,
            start,
            steps: self.steps,
            edges: self.edges,
            breakpoints: self.breakpoints,
            schema: self.schema,
            input_policy: self.input_policy,
        })
    }
}
