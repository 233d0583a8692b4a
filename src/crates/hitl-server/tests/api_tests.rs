//! HTTP API exercised in-process through `tower::ServiceExt::oneshot`

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use hitl_checkpoint::{InMemoryCheckpointStore, SqliteCheckpointStore};
use hitl_core::Engine;
use hitl_server::{create_router, AppState};
use hitl_workflows::{builtin_registry, Collaborators, PaperBroker};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app_with(engine: Engine, collaborators: &Collaborators) -> Router {
    let registry = builtin_registry(collaborators).unwrap();
    create_router(AppState::new(engine, registry))
}

fn app() -> Router {
    app_with(
        Engine::new(Arc::new(InMemoryCheckpointStore::new())),
        &Collaborators::offline(),
    )
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn purchase_start(thread_id: &str) -> Value {
    json!({
        "workflow": "purchase_stock",
        "thread_id": thread_id,
        "input": {"stock": "WIPRO", "price": 239.70, "quantity": 50}
    })
}

#[tokio::test]
async fn test_health_and_workflows() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body) = call(&app, Method::GET, "/workflows", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_start_pending_resume_flow() {
    let app = app();

    let (status, body) = call(&app, Method::POST, "/start", Some(purchase_start("api-1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("paused"));
    assert_eq!(body["thread_id"], json!("api-1"));
    assert_eq!(
        body["payload"]["question"],
        json!("Approve buying 50 shares of WIPRO at 239.7 each? (yes/no): ")
    );

    let (status, pending) = call(&app, Method::GET, "/pending/api-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["status"], json!("paused"));
    assert_eq!(pending["interrupt_payload"], body["payload"]);

    let (status, done) = call(
        &app,
        Method::POST,
        "/resume/api-1",
        Some(json!({"decision": "yes", "expected_sequence": body["sequence"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], json!("completed"));
    assert_eq!(done["payload"]["result"]["total_cost"], json!(11985.0));

    let (_, pending) = call(&app, Method::GET, "/pending/api-1", None).await;
    assert_eq!(pending, json!({"status": "no pending"}));

    let (status, err) = call(&app, Method::POST, "/resume/api-1", Some(json!({"decision": "yes"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["status"], json!("error"));
    assert_eq!(err["kind"], json!("no_pending_interrupt"));
}

#[tokio::test]
async fn test_start_generates_thread_id() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/start",
        Some(json!({"workflow": "deployment_approval", "initial_input": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["thread_id"].as_str().unwrap().is_empty());
    assert_eq!(body["payload"]["message"], json!("Approve deployment?"));
}

#[tokio::test]
async fn test_error_responses() {
    let app = app();

    let (status, err) = call(&app, Method::POST, "/resume/ghost", Some(json!({"decision": "yes"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], json!("no_pending_interrupt"));

    let (status, err) = call(
        &app,
        Method::POST,
        "/start",
        Some(json!({"workflow": "nope", "input": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["kind"], json!("unknown_workflow"));

    let (status, err) = call(&app, Method::POST, "/resume/ghost", Some(json!({"verdict": "yes"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], json!("bad_request"));

    let (status, err) = call(&app, Method::GET, "/threads/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["kind"], json!("thread_not_found"));

    call(&app, Method::POST, "/start", Some(purchase_start("dup"))).await;
    let (status, err) = call(&app, Method::POST, "/start", Some(purchase_start("dup"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], json!("thread_exists"));

    let (status, err) = call(
        &app,
        Method::POST,
        "/resume/dup",
        Some(json!({"decision": "maybe"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["kind"], json!("invalid_resume_value"));

    let (status, err) = call(
        &app,
        Method::POST,
        "/resume/dup",
        Some(json!({"decision": "yes", "expected_sequence": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], json!("stale_checkpoint"));
}

#[tokio::test]
async fn test_thread_admin_routes() {
    let app = app();
    call(
        &app,
        Method::POST,
        "/start",
        Some(json!({"workflow": "feedback_review", "thread_id": "fb", "input": {"input": "draft"}})),
    )
    .await;

    let (status, snapshot) = call(&app, Method::GET, "/threads/fb", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["status"], json!("paused"));
    assert_eq!(snapshot["next_step"], json!("human_feedback"));

    let (status, snapshot) = call(
        &app,
        Method::POST,
        "/threads/fb/state",
        Some(json!({"values": {"user_feedback": "fine"}, "as_step": "human_feedback"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["status"], json!("ready"));
    assert_eq!(snapshot["next_step"], json!("step_b"));

    let (status, err) = call(
        &app,
        Method::POST,
        "/threads/fb/state",
        Some(json!({"values": {}, "as_step": "no_such_step"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], json!("invalid_input"));

    let (status, done) = call(&app, Method::POST, "/threads/fb/proceed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["payload"]["visited"], json!(["step_a", "step_b", "step_c"]));

    let (_, history) = call(&app, Method::GET, "/threads/fb/history?limit=2", None).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
    let (status, empty) = call(&app, Method::GET, "/threads/fb/history?limit=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!([]));
    let (status, _) = call(&app, Method::GET, "/threads/fb/history?limit=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, threads) = call(&app, Method::GET, "/threads", None).await;
    assert_eq!(threads.as_array().unwrap().len(), 1);

    let (status, deleted) = call(&app, Method::DELETE, "/threads/fb", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["status"], json!("deleted"));
    let (status, _) = call(&app, Method::DELETE, "/threads/fb", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resume_through_new_server_instance() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("api.db");

    {
        let store = SqliteCheckpointStore::connect(&path).await.unwrap();
        let app = app_with(Engine::new(Arc::new(store)), &Collaborators::offline());
        let (_, body) = call(&app, Method::POST, "/start", Some(purchase_start("restart"))).await;
        assert_eq!(body["status"], json!("paused"));
    }

    let broker = Arc::new(PaperBroker::new());
    let store = SqliteCheckpointStore::connect(&path).await.unwrap();
    let app = app_with(
        Engine::new(Arc::new(store)),
        &Collaborators::offline().with_broker(broker.clone()),
    );
    let (status, done) = call(&app, Method::POST, "/resume/restart", Some(json!({"decision": "yes"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["payload"]["result"]["status"], json!("success"));
    assert_eq!(broker.order_count(), 1);
}
