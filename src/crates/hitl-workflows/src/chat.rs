//! Chat where every answer needs a reviewer's yes
//!
//! The thread is a conversation: each `start` on an existing thread appends
//! the new user messages and runs the turn again. Before the responder is
//! called the turn pauses with the latest user message; a rejection appends
//! a refusal instead of an answer, so no reply is generated for rejected
//! questions.
//!
//! Input: `{"messages": [{"role": "user", "content": "..."}]}`.

use crate::collaborators::{ChatMessage, Collaborators, Responder};
use hitl_core::{
    step_keys, AppendReducer, DefinitionError, InputPolicy, Next, StepContext, StepError, Workflow,
    WorkflowBuilder,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NAME: &str = "chat_approval";

pub const BLOCKED_REPLY: &str = "Response blocked by human approval.";

step_keys! {
    pub enum ChatSteps {
        Chat => "chat",
    }
}

pub fn workflow(collaborators: &Collaborators) -> Result<Workflow<ChatSteps>, DefinitionError> {
    let responder = collaborators.responder.clone();

    WorkflowBuilder::new(NAME)
        .description("Conversation where each reply is held until a reviewer approves it")
        .reducer("messages", AppendReducer)
        .input_policy(InputPolicy::Merge)
        .add_step(ChatSteps::Chat, move |ctx| chat(ctx, responder.clone()))
        .add_edge(ChatSteps::Chat, Next::End)
        .set_start(ChatSteps::Chat)
        .build()
}

async fn chat(ctx: StepContext, responder: Arc<dyn Responder>) -> Result<Value, StepError> {
    let messages: Vec<ChatMessage> = ctx.field("messages")?.unwrap_or_default();
    let question = messages
        .last()
        .map(|m| m.content.clone())
        .ok_or_else(|| StepError::failed("conversation has no messages"))?;

    let decision = ctx.interrupt_for_decision(json!({
        "type": "human_approval",
        "question": question,
        "instruction": "Approve this response? (yes/no)",
    }))?;

    let reply = if decision.approved {
        responder.reply(&messages).await?
    } else {
        BLOCKED_REPLY.to_string()
    };
    Ok(json!({ "messages": [ChatMessage::assistant(reply)] }))
}
