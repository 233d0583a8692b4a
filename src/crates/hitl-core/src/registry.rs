//! Name-based lookup of workflows for the HTTP API and CLI
//!
//! [`Workflow`] is generic over its step enum, so callers that only have a
//! workflow name (or a thread id) go through the object-safe
//! [`WorkflowHandle`] trait instead.

use crate::engine::{Engine, RunResult, ThreadSnapshot};
use crate::error::{DefinitionError, GraphError, Result};
use crate::graph::Workflow;
use crate::step::StepKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type-erased workflow operations
#[async_trait]
pub trait WorkflowHandle: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn steps(&self) -> Vec<&'static str>;

    async fn start(&self, engine: &Engine, thread_id: &str, input: Value) -> Result<RunResult>;

    async fn resume(
        &self,
        engine: &Engine,
        thread_id: &str,
        value: Value,
        expected_sequence: Option<u64>,
    ) -> Result<RunResult>;

    async fn proceed(&self, engine: &Engine, thread_id: &str) -> Result<RunResult>;

    async fn update_state(
        &self,
        engine: &Engine,
        thread_id: &str,
        values: Value,
        as_step: Option<&str>,
    ) -> Result<ThreadSnapshot>;
}

#[async_trait]
impl<K: StepKey> WorkflowHandle for Workflow<K> {
    fn name(&self) -> &str {
        Workflow::name(self)
    }

    fn description(&self) -> &str {
        Workflow::description(self)
    }

    fn steps(&self) -> Vec<&'static str> {
        self.step_names()
    }

    async fn start(&self, engine: &Engine, thread_id: &str, input: Value) -> Result<RunResult> {
        engine.start(self, thread_id, input).await
    }

    async fn resume(
        &self,
        engine: &Engine,
        thread_id: &str,
        value: Value,
        expected_sequence: Option<u64>,
    ) -> Result<RunResult> {
        match expected_sequence {
            Some(expected) => engine.resume_checked(self, thread_id, value, expected).await,
            None => engine.resume(self, thread_id, value).await,
        }
    }

    async fn proceed(&self, engine: &Engine, thread_id: &str) -> Result<RunResult> {
        engine.proceed(self, thread_id).await
    }

    async fn update_state(
        &self,
        engine: &Engine,
        thread_id: &str,
        values: Value,
        as_step: Option<&str>,
    ) -> Result<ThreadSnapshot> {
        let as_step = as_step
            .map(|name| {
                K::from_name(name).ok_or_else(|| {
                    GraphError::InvalidInput(format!(
                        "workflow '{}' has no step '{}'",
                        Workflow::name(self),
                        name
                    ))
                })
            })
            .transpose()?;
        engine.update_state(self, thread_id, values, as_step).await
    }
}

/// Listing entry for a registered workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub name: String,
    pub description: String,
    pub steps: Vec<String>,
}

/// Registered workflows by name
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, Arc<dyn WorkflowHandle>>,
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.workflows.keys()).finish()
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, workflow: Arc<dyn WorkflowHandle>) -> Result<()> {
        let name = workflow.name().to_string();
        if self.workflows.contains_key(&name) {
            return Err(DefinitionError::DuplicateWorkflow(name).into());
        }
        self.workflows.insert(name, workflow);
        Ok(())
    }

    pub fn with<W: WorkflowHandle + 'static>(mut self, workflow: W) -> Result<Self> {
        self.register(Arc::new(workflow))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn WorkflowHandle>> {
        self.workflows
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownWorkflow(name.to_string()))
    }

    /// Workflow that owns an existing thread
    pub async fn for_thread(&self, engine: &Engine, thread_id: &str) -> Result<Arc<dyn WorkflowHandle>> {
        let snapshot = engine.snapshot(thread_id).await?;
        self.get(&snapshot.workflow)
    }

    pub fn list(&self) -> Vec<WorkflowInfo> {
        self.workflows
            .values()
            .map(|w| WorkflowInfo {
                name: w.name().to_string(),
                description: w.description().to_string(),
                steps: w.steps().into_iter().map(str::to_string).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Resume a thread without knowing its workflow up front
    pub async fn resume(
        &self,
        engine: &Engine,
        thread_id: &str,
        value: Value,
        expected_sequence: Option<u64>,
    ) -> Result<RunResult> {
        let workflow = match engine.pending(thread_id).await? {
            Some(pending) => self.get(&pending.workflow)?,
            None => {
                return Err(GraphError::NoPendingInterrupt {
                    thread_id: thread_id.to_string(),
                })
            }
        };
        workflow
            .resume(engine, thread_id, value, expected_sequence)
            .await
    }

    pub async fn proceed(&self, engine: &Engine, thread_id: &str) -> Result<RunResult> {
        self.for_thread(engine, thread_id)
            .await?
            .proceed(engine, thread_id)
            .await
    }

    pub async fn update_state(
        &self,
        engine: &Engine,
        thread_id: &str,
        values: Value,
        as_step: Option<&str>,
    ) -> Result<ThreadSnapshot> {
        self.for_thread(engine, thread_id)
            .await?
            .update_state(engine, thread_id, values, as_step)
            .await
    }
}
