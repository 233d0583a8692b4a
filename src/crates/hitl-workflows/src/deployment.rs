//! Deployment sign-off: generate a proposal, ask once, record the verdict

use hitl_core::{
    step_keys, DefinitionError, Next, StepContext, StepError, Workflow, WorkflowBuilder,
};
use serde_json::{json, Value};

pub const NAME: &str = "deployment_approval";

pub const DEFAULT_PROPOSAL: &str = "Deploy model to production";

step_keys! {
    pub enum DeploymentSteps {
        Generate => "generate",
        Approval => "approval",
        Final => "final",
    }
}

pub fn workflow() -> Result<Workflow<DeploymentSteps>, DefinitionError> {
    WorkflowBuilder::new(NAME)
        .description("Propose a deployment and wait for an approve/reject decision")
        .add_step(DeploymentSteps::Generate, generate)
        .add_step(DeploymentSteps::Approval, approval)
        .add_step(DeploymentSteps::Final, finish)
        .add_edge(DeploymentSteps::Generate, DeploymentSteps::Approval)
        .add_edge(DeploymentSteps::Approval, DeploymentSteps::Final)
        .add_edge(DeploymentSteps::Final, Next::End)
        .set_start(DeploymentSteps::Generate)
        .build()
}

async fn generate(ctx: StepContext) -> Result<Value, StepError> {
    // an explicit proposal in the input wins
    if ctx.get_str("proposal").is_some_and(|p| !p.trim().is_empty()) {
        return Ok(Value::Null);
    }
    Ok(json!({ "proposal": DEFAULT_PROPOSAL }))
}

async fn approval(ctx: StepContext) -> Result<Value, StepError> {
    let decision = ctx.interrupt_for_decision(json!({
        "message": "Approve deployment?",
        "proposal": ctx.get("proposal"),
    }))?;
    Ok(json!({ "approved": decision.approved }))
}

async fn finish(ctx: StepContext) -> Result<Value, StepError> {
    let status = if ctx.get_bool("approved").unwrap_or(false) {
        "deployment_approved"
    } else {
        "deployment_rejected"
    };
    Ok(json!({ "status": status }))
}
