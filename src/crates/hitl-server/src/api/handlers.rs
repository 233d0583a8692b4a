//! Route handlers
//!
//! Handlers are thin: they decode the request, call the engine through the
//! workflow registry and wrap the result. Thread-level operations look the
//! workflow up from the thread's own checkpoint.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use hitl_core::{Checkpoint, ThreadSnapshot, ThreadSummary, WorkflowInfo};
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::models::{
    DeleteResponse, HealthResponse, HistoryQuery, PendingResponse, ResumeRequest, RunResponse,
    StartRequest, UpdateStateRequest,
};
use crate::api::routes::AppState;

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// GET /workflows
pub async fn list_workflows(State(state): State<AppState>) -> Json<Vec<WorkflowInfo>> {
    Json(state.registry.list())
}

/// POST /start
pub async fn start(
    State(state): State<AppState>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<Json<RunResponse>> {
    let Json(request) = payload?;
    let thread_id = request
        .thread_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let workflow = state.registry.get(&request.workflow)?;
    info!(workflow = %request.workflow, thread_id = %thread_id, "Start requested");
    let result = workflow.start(&state.engine, &thread_id, request.input).await?;
    Ok(Json(result.into()))
}

/// GET /pending/:thread_id
pub async fn pending(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<PendingResponse>> {
    let response = match state.engine.pending(&thread_id).await? {
        Some(view) => view.into(),
        None => PendingResponse::none(),
    };
    Ok(Json(response))
}

/// POST /resume/:thread_id
pub async fn resume(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    payload: Result<Json<ResumeRequest>, JsonRejection>,
) -> ApiResult<Json<RunResponse>> {
    let Json(request) = payload?;
    info!(thread_id = %thread_id, expected_sequence = ?request.expected_sequence, "Resume requested");
    let result = state
        .registry
        .resume(&state.engine, &thread_id, request.decision, request.expected_sequence)
        .await?;
    Ok(Json(result.into()))
}

/// GET /threads
pub async fn list_threads(State(state): State<AppState>) -> ApiResult<Json<Vec<ThreadSummary>>> {
    Ok(Json(state.engine.threads().await?))
}

/// GET /threads/:thread_id
pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ThreadSnapshot>> {
    Ok(Json(state.engine.snapshot(&thread_id).await?))
}

/// GET /threads/:thread_id/history
pub async fn thread_history(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Checkpoint>>> {
    let Query(query) = query?;
    Ok(Json(state.engine.history(&thread_id, query.limit).await?))
}

/// POST /threads/:thread_id/state
pub async fn update_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    payload: Result<Json<UpdateStateRequest>, JsonRejection>,
) -> ApiResult<Json<ThreadSnapshot>> {
    let Json(request) = payload?;
    let snapshot = state
        .registry
        .update_state(&state.engine, &thread_id, request.values, request.as_step.as_deref())
        .await?;
    Ok(Json(snapshot))
}

/// POST /threads/:thread_id/proceed
pub async fn proceed(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<RunResponse>> {
    let result = state.registry.proceed(&state.engine, &thread_id).await?;
    Ok(Json(result.into()))
}

/// DELETE /threads/:thread_id
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed = state.engine.delete_thread(&thread_id).await?;
    Ok(Json(DeleteResponse {
        status: "deleted".to_string(),
        thread_id,
        removed,
    }))
}

