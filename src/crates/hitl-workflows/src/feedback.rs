//! Static breakpoint before a feedback step
//!
//! Execution stops before `human_feedback` runs. The reviewer either
//! resumes with a state update (`{"user_feedback": "..."}`) or writes the
//! feedback through `update_state(.., as_step = "human_feedback")` and then
//! calls `proceed`; both continue to `step_b` and `step_c`.

use hitl_core::{
    step_keys, DefinitionError, Next, StepContext, StepError, Workflow, WorkflowBuilder,
};
use serde_json::{json, Value};
use tracing::debug;

pub const NAME: &str = "feedback_review";

step_keys! {
    pub enum FeedbackSteps {
        StepA => "step_a",
        HumanFeedback => "human_feedback",
        StepB => "step_b",
        StepC => "step_c",
    }
}

pub fn workflow() -> Result<Workflow<FeedbackSteps>, DefinitionError> {
    WorkflowBuilder::new(NAME)
        .description("Pause before the feedback step so a reviewer can edit the state")
        .add_step(FeedbackSteps::StepA, |ctx| mark(ctx, "step_a"))
        .add_step(FeedbackSteps::HumanFeedback, |ctx| mark(ctx, "human_feedback"))
        .add_step(FeedbackSteps::StepB, |ctx| mark(ctx, "step_b"))
        .add_step(FeedbackSteps::StepC, |ctx| mark(ctx, "step_c"))
        .add_edge(FeedbackSteps::StepA, FeedbackSteps::HumanFeedback)
        .add_edge(FeedbackSteps::HumanFeedback, FeedbackSteps::StepB)
        .add_edge(FeedbackSteps::StepB, FeedbackSteps::StepC)
        .add_edge(FeedbackSteps::StepC, Next::End)
        .interrupt_before(FeedbackSteps::HumanFeedback)
        .set_start(FeedbackSteps::StepA)
        .build()
}

/// Record that `step` ran and what feedback it saw
async fn mark(ctx: StepContext, step: &'static str) -> Result<Value, StepError> {
    let mut visited: Vec<String> = ctx.field("visited")?.unwrap_or_default();
    visited.push(step.to_string());
    debug!(thread_id = %ctx.thread_id(), step, feedback = ?ctx.get_str("user_feedback"), "Feedback workflow step");
    Ok(json!({ "visited": visited }))
}
