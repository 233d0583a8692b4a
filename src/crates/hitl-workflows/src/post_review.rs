//! Post drafting with a human review loop
//!
//! ```text
//! search_topic ─▶ generate_post ─▶ human_review ─┬─ approved ───────────────▶ finalize_post ─▶ END
//!                                      ▲         ├─ iteration >= max ───────▶ finalize_post
//!                                      │         └─ otherwise ─▶ regenerate_post
//!                                      └──────────────────────────────┘
//! ```
//!
//! The reviewer answers with `"yes"`, `"no"` or
//! `{"approved": false, "suggestion": "..."}`. Every regeneration bumps
//! `iteration`, so the loop ends after `max_iteration` drafts even if the
//! reviewer never approves.

use crate::collaborators::{Collaborators, PostWriter, Researcher};
use hitl_core::{
    step_keys, DefinitionError, Next, StepContext, StepError, Workflow, WorkflowBuilder,
    WorkflowState,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NAME: &str = "linkedin_post";

/// Used when the input does not set `max_iteration`
pub const DEFAULT_MAX_ITERATION: i64 = 3;

const SEARCH_QUERIES: [&str; 4] = [
    "Latest developments about",
    "History of",
    "Current challenges of",
    "Future trends of",
];

step_keys! {
    pub enum PostSteps {
        SearchTopic => "search_topic",
        GeneratePost => "generate_post",
        HumanReview => "human_review",
        RegeneratePost => "regenerate_post",
        FinalizePost => "finalize_post",
    }
}

pub fn workflow(collaborators: &Collaborators) -> Result<Workflow<PostSteps>, DefinitionError> {
    let researcher = collaborators.researcher.clone();
    let writer = collaborators.writer.clone();
    let rewriter = collaborators.writer.clone();

    WorkflowBuilder::new(NAME)
        .description("Research a topic, draft a post and loop on reviewer feedback")
        .add_step(PostSteps::SearchTopic, move |ctx| search_topic(ctx, researcher.clone()))
        .add_step(PostSteps::GeneratePost, move |ctx| generate_post(ctx, writer.clone()))
        .add_step(PostSteps::HumanReview, human_review)
        .add_step(PostSteps::RegeneratePost, move |ctx| regenerate_post(ctx, rewriter.clone()))
        .add_step(PostSteps::FinalizePost, finalize_post)
        .add_edge(PostSteps::SearchTopic, PostSteps::GeneratePost)
        .add_edge(PostSteps::GeneratePost, PostSteps::HumanReview)
        .add_conditional_edge(PostSteps::HumanReview, review_router)
        .add_edge(PostSteps::RegeneratePost, PostSteps::HumanReview)
        .add_edge(PostSteps::FinalizePost, Next::End)
        .set_start(PostSteps::SearchTopic)
        .build()
}

/// Finalize once approved or out of iterations, otherwise rewrite
pub fn review_router(state: &WorkflowState) -> Next<PostSteps> {
    let approved = state.get("approved").and_then(Value::as_bool).unwrap_or(false);
    if approved || iteration(state) >= max_iteration(state) {
        Next::Step(PostSteps::FinalizePost)
    } else {
        Next::Step(PostSteps::RegeneratePost)
    }
}

fn iteration(state: &WorkflowState) -> i64 {
    state.get("iteration").and_then(Value::as_i64).unwrap_or(0)
}

fn max_iteration(state: &WorkflowState) -> i64 {
    state
        .get("max_iteration")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_MAX_ITERATION)
}

fn topic(ctx: &StepContext) -> Result<String, StepError> {
    let topic = ctx.require_str("topic")?.trim();
    if topic.is_empty() {
        return Err(StepError::failed("topic must not be empty"));
    }
    Ok(topic.to_string())
}

async fn search_topic(ctx: StepContext, researcher: Arc<dyn Researcher>) -> Result<Value, StepError> {
    let topic = topic(&ctx)?;
    let mut notes = Vec::with_capacity(SEARCH_QUERIES.len());
    for prefix in SEARCH_QUERIES {
        notes.push(researcher.search(&format!("{} {}", prefix, topic)).await?);
    }
    Ok(json!({ "search": notes.join("\n\n") }))
}

async fn generate_post(ctx: StepContext, writer: Arc<dyn PostWriter>) -> Result<Value, StepError> {
    let topic = topic(&ctx)?;
    let research = ctx.get_str("search").unwrap_or_default();
    let post = writer.draft(&topic, research).await?;
    Ok(json!({
        "post": post,
        "iteration": 1,
        "approved": false,
    }))
}

async fn human_review(ctx: StepContext) -> Result<Value, StepError> {
    let decision = ctx.interrupt_for_decision(json!({
        "topic": ctx.get("topic"),
        "post": ctx.get("post"),
        "iteration": iteration(ctx.state()),
        "max_iteration": max_iteration(ctx.state()),
    }))?;
    Ok(json!({
        "approved": decision.approved,
        "suggestion": decision.suggestion,
    }))
}

async fn regenerate_post(ctx: StepContext, writer: Arc<dyn PostWriter>) -> Result<Value, StepError> {
    let topic = topic(&ctx)?;
    let previous = ctx.require_str("post")?;
    let post = writer
        .revise(
            &topic,
            ctx.get_str("search").unwrap_or_default(),
            previous,
            ctx.get_str("suggestion"),
        )
        .await?;
    Ok(json!({
        "post": post,
        "iteration": iteration(ctx.state()) + 1,
    }))
}

async fn finalize_post(ctx: StepContext) -> Result<Value, StepError> {
    let outcome = if ctx.get_bool("approved").unwrap_or(false) {
        "approved"
    } else {
        "max_iterations_reached"
    };
    Ok(json!({
        "final_post": ctx.get("post"),
        "outcome": outcome,
    }))
}
