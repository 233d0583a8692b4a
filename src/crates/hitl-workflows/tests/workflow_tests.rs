//! The bundled workflows driven through the engine

use hitl_checkpoint::{CheckpointStore, InMemoryCheckpointStore, InterruptWhen, SqliteCheckpointStore};
use hitl_core::{Engine, GraphError, RunResult, ThreadStatus, WorkflowState};
use hitl_workflows::chat::{self, BLOCKED_REPLY};
use hitl_workflows::feedback::{self, FeedbackSteps};
use hitl_workflows::{builtin_registry, deployment, post_review, purchase, Collaborators, PaperBroker};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn memory_engine() -> Engine {
    Engine::new(Arc::new(InMemoryCheckpointStore::new()))
}

fn completed_state(result: &RunResult) -> &WorkflowState {
    result
        .state()
        .unwrap_or_else(|| panic!("expected completion, got {:?}", result))
}

fn purchase_input() -> Value {
    json!({"stock": "WIPRO", "price": 239.70, "quantity": 50})
}

#[tokio::test]
async fn test_post_review_finalizes_after_max_iterations() {
    let engine = memory_engine();
    let workflow = post_review::workflow(&Collaborators::offline()).unwrap();

    let first = engine
        .start(
            &workflow,
            "post-1",
            json!({"topic": "rust async", "iteration": 0, "max_iteration": 2, "approved": false}),
        )
        .await
        .unwrap();
    let review = first.interrupt().unwrap();
    assert_eq!(review.step, "human_review");
    assert_eq!(review.payload["iteration"], json!(1));
    assert_eq!(review.payload["max_iteration"], json!(2));
    assert_eq!(review.payload["topic"], json!("rust async"));
    let first_draft = review.payload["post"].as_str().unwrap().to_string();

    let second = engine.resume(&workflow, "post-1", json!("no")).await.unwrap();
    let review = second.interrupt().unwrap();
    assert_eq!(review.payload["iteration"], json!(2));
    assert_ne!(review.payload["post"], json!(first_draft));

    let done = engine
        .resume(&workflow, "post-1", json!({"approved": false, "suggestion": "add an example"}))
        .await
        .unwrap();
    let state = completed_state(&done);
    assert_eq!(state["outcome"], json!("max_iterations_reached"));
    assert_eq!(state["iteration"], json!(2));
    assert_eq!(state["approved"], json!(false));
    assert_eq!(state["final_post"], state["post"]);
}

#[tokio::test]
async fn test_post_review_approval_ends_loop() {
    let engine = memory_engine();
    let workflow = post_review::workflow(&Collaborators::offline()).unwrap();

    engine
        .start(&workflow, "post-2", json!({"topic": "databases", "max_iteration": 5}))
        .await
        .unwrap();
    let done = engine.resume(&workflow, "post-2", json!("yes")).await.unwrap();
    let state = completed_state(&done);
    assert_eq!(state["outcome"], json!("approved"));
    assert_eq!(state["iteration"], json!(1));
    assert_eq!(state["search"].as_str().unwrap().split("\n\n").count(), 4);
}

#[tokio::test]
async fn test_post_review_resume_is_deterministic() {
    let source = Arc::new(InMemoryCheckpointStore::new());
    let engine = Engine::new(source.clone());
    let workflow = post_review::workflow(&Collaborators::offline()).unwrap();
    engine
        .start(&workflow, "post-3", json!({"topic": "compilers", "max_iteration": 3}))
        .await
        .unwrap();

    let mut chain = source.list("post-3", None).await.unwrap();
    chain.reverse();

    let mut finals = Vec::new();
    for _ in 0..2 {
        let copy = Arc::new(InMemoryCheckpointStore::new());
        let mut previous = None;
        for checkpoint in &chain {
            copy.put(checkpoint, previous).await.unwrap();
            previous = Some(checkpoint.sequence);
        }
        let engine = Engine::new(copy);
        engine
            .resume(&workflow, "post-3", json!({"approved": false, "suggestion": "tighter"}))
            .await
            .unwrap();
        let done = engine.resume(&workflow, "post-3", json!("yes")).await.unwrap();
        finals.push(completed_state(&done).clone());
    }
    assert_eq!(finals[0], finals[1]);
}

#[tokio::test]
async fn test_purchase_approved_once() {
    let broker = Arc::new(PaperBroker::new());
    let collaborators = Collaborators::offline().with_broker(broker.clone());
    let workflow = purchase::workflow(&collaborators).unwrap();
    let engine = memory_engine();

    let paused = engine.start(&workflow, "buy-1", purchase_input()).await.unwrap();
    let interrupt = paused.interrupt().unwrap();
    assert_eq!(
        interrupt.payload["question"],
        json!("Approve buying 50 shares of WIPRO at 239.7 each? (yes/no): ")
    );
    assert_eq!(engine.pending("buy-1").await.unwrap().unwrap().interrupt.id, interrupt.id);
    assert_eq!(broker.order_count(), 0);

    let done = engine.resume(&workflow, "buy-1", json!("yes")).await.unwrap();
    let result = &completed_state(&done)["result"];
    assert_eq!(result["status"], json!("success"));
    assert_eq!(result["total_cost"], json!(11985.00));
    assert_eq!(result["price_per_unit"], json!(239.7));
    assert_eq!(result["stock_name"], json!("WIPRO"));
    assert_eq!(broker.order_count(), 1);

    let err = engine.resume(&workflow, "buy-1", json!("yes")).await.unwrap_err();
    assert!(matches!(err, GraphError::NoPendingInterrupt { .. }));
    assert_eq!(broker.order_count(), 1);
}

#[tokio::test]
async fn test_purchase_rejected_echoes_order() {
    let broker = Arc::new(PaperBroker::new());
    let workflow = purchase::workflow(&Collaborators::offline().with_broker(broker.clone())).unwrap();
    let engine = memory_engine();

    engine.start(&workflow, "buy-2", purchase_input()).await.unwrap();
    let done = engine.resume(&workflow, "buy-2", json!("no")).await.unwrap();
    let result = &completed_state(&done)["result"];
    assert_eq!(result["status"], json!("cancelled"));
    assert_eq!(result["stock_name"], json!("WIPRO"));
    assert_eq!(result["quantity"], json!(50));
    assert_eq!(
        result["message"],
        json!("Purchase of 50 shares of WIPRO was cancelled by user.")
    );
    assert_eq!(broker.order_count(), 0);
}

#[tokio::test]
async fn test_purchase_validation_error_skips_approval() {
    let workflow = purchase::workflow(&Collaborators::offline()).unwrap();
    let engine = memory_engine();

    let done = engine
        .start(&workflow, "buy-3", json!({"stock": "WIPRO", "price": 239.70, "quantity": 0}))
        .await
        .unwrap();
    let result = &completed_state(&done)["result"];
    assert_eq!(result["status"], json!("error"));
    assert_eq!(result["error_type"], json!("validation_error"));
    assert_eq!(result["message"], json!("Quantity must be greater than 0"));
}

#[tokio::test]
async fn test_purchase_malformed_decision_keeps_pause() {
    let broker = Arc::new(PaperBroker::new());
    let workflow = purchase::workflow(&Collaborators::offline().with_broker(broker.clone())).unwrap();
    let engine = memory_engine();

    let paused = engine.start(&workflow, "buy-4", purchase_input()).await.unwrap();
    let err = engine
        .resume(&workflow, "buy-4", json!({"approved": "perhaps"}))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidResumeValue { .. }));
    assert_eq!(broker.order_count(), 0);

    let still = engine.pending("buy-4").await.unwrap().unwrap();
    assert_eq!(still.sequence, paused.sequence());
}

#[tokio::test]
async fn test_resume_unknown_thread_reports_no_pending() {
    let engine = memory_engine();
    let registry = builtin_registry(&Collaborators::offline()).unwrap();
    let workflow = purchase::workflow(&Collaborators::offline()).unwrap();

    let err = engine.resume(&workflow, "never-started", json!("yes")).await.unwrap_err();
    assert!(matches!(err, GraphError::NoPendingInterrupt { .. }));

    let err = registry
        .resume(&engine, "never-started", json!("yes"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "no_pending_interrupt");
}

#[tokio::test]
async fn test_purchase_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hitl.db");

    let paused_sequence = {
        let store = SqliteCheckpointStore::connect(&path).await.unwrap();
        let engine = Engine::new(Arc::new(store.clone()));
        let registry = builtin_registry(&Collaborators::offline()).unwrap();
        let paused = registry
            .get("purchase_stock")
            .unwrap()
            .start(&engine, "buy-durable", purchase_input())
            .await
            .unwrap();
        assert!(paused.is_paused());
        store.close().await;
        paused.sequence()
    };

    let broker = Arc::new(PaperBroker::new());
    let store = SqliteCheckpointStore::connect(&path).await.unwrap();
    let engine = Engine::new(Arc::new(store));
    let registry = builtin_registry(&Collaborators::offline().with_broker(broker.clone())).unwrap();

    let done = registry
        .resume(&engine, "buy-durable", json!("yes"), Some(paused_sequence))
        .await
        .unwrap();
    assert!(done.sequence() > paused_sequence);
    assert_eq!(completed_state(&done)["result"]["total_cost"], json!(11985.0));
    assert_eq!(broker.order_count(), 1);
}

#[tokio::test]
async fn test_deployment_approval() {
    let workflow = deployment::workflow().unwrap();
    let engine = memory_engine();

    let paused = engine.start(&workflow, "deploy-1", json!({})).await.unwrap();
    let payload = &paused.interrupt().unwrap().payload;
    assert_eq!(payload["message"], json!("Approve deployment?"));
    assert_eq!(payload["proposal"], json!(deployment::DEFAULT_PROPOSAL));

    let done = engine
        .resume(&workflow, "deploy-1", json!({"approved": true}))
        .await
        .unwrap();
    assert_eq!(completed_state(&done)["status"], json!("deployment_approved"));

    engine
        .start(&workflow, "deploy-2", json!({"proposal": "Roll back to v1"}))
        .await
        .unwrap();
    let done = engine.resume(&workflow, "deploy-2", json!("no")).await.unwrap();
    let state = completed_state(&done);
    assert_eq!(state["proposal"], json!("Roll back to v1"));
    assert_eq!(state["status"], json!("deployment_rejected"));
}

#[tokio::test]
async fn test_chat_turns_append_messages() {
    let workflow = chat::workflow(&Collaborators::offline()).unwrap();
    let engine = memory_engine();

    let paused = engine
        .start(&workflow, "chat-1", json!({"messages": [{"role": "user", "content": "hello"}]}))
        .await
        .unwrap();
    assert_eq!(paused.interrupt().unwrap().payload["question"], json!("hello"));

    let done = engine.resume(&workflow, "chat-1", json!("yes")).await.unwrap();
    let messages = completed_state(&done)["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["content"], json!("You said: hello"));

    // the same thread continues with the next question
    let paused = engine
        .start(&workflow, "chat-1", json!({"messages": [{"role": "user", "content": "bye"}]}))
        .await
        .unwrap();
    assert_eq!(paused.interrupt().unwrap().payload["question"], json!("bye"));

    let done = engine
        .start(&workflow, "chat-1", json!({"approved": "no"}))
        .await
        .unwrap();
    let messages = completed_state(&done)["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3]["content"], json!(BLOCKED_REPLY));
}

#[tokio::test]
async fn test_feedback_breakpoint_with_state_update() {
    let workflow = feedback::workflow().unwrap();
    let engine = memory_engine();

    let paused = engine
        .start(&workflow, "fb-1", json!({"input": "hello"}))
        .await
        .unwrap();
    let interrupt = paused.interrupt().unwrap();
    assert_eq!(interrupt.when, InterruptWhen::Before);
    assert_eq!(interrupt.step, "human_feedback");

    let snapshot = engine
        .update_state(
            &workflow,
            "fb-1",
            json!({"user_feedback": "looks good"}),
            Some(FeedbackSteps::HumanFeedback),
        )
        .await
        .unwrap();
    assert_eq!(snapshot.status, ThreadStatus::Ready);
    assert_eq!(snapshot.next_step.as_deref(), Some("step_b"));

    let done = engine.proceed(&workflow, "fb-1").await.unwrap();
    let state = completed_state(&done);
    assert_eq!(state["visited"], json!(["step_a", "step_b", "step_c"]));
    assert_eq!(state["user_feedback"], json!("looks good"));
}

#[tokio::test]
async fn test_feedback_breakpoint_resume_runs_step() {
    let workflow = feedback::workflow().unwrap();
    let engine = memory_engine();

    engine.start(&workflow, "fb-2", json!({"input": "hello"})).await.unwrap();
    let done = engine
        .resume(&workflow, "fb-2", json!({"user_feedback": "ship it"}))
        .await
        .unwrap();
    let state = completed_state(&done);
    assert_eq!(
        state["visited"],
        json!(["step_a", "human_feedback", "step_b", "step_c"])
    );
    assert_eq!(state["user_feedback"], json!("ship it"));
}
