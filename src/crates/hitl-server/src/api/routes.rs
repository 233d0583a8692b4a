//! Route table

use axum::{
    routing::{get, post},
    Router,
};
use hitl_core::{Engine, WorkflowRegistry};
use std::sync::Arc;

use crate::api::{handlers, middleware};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub registry: Arc<WorkflowRegistry>,
}

impl AppState {
    pub fn new(engine: Engine, registry: WorkflowRegistry) -> Self {
        Self {
            engine,
            registry: Arc::new(registry),
        }
    }
}

/// Build the complete API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/workflows", get(handlers::list_workflows))
        // Caller-facing run protocol
        .route("/start", post(handlers::start))
        .route("/pending/:thread_id", get(handlers::pending))
        .route("/resume/:thread_id", post(handlers::resume))
        // Thread administration
        .route("/threads", get(handlers::list_threads))
        .route(
            "/threads/:thread_id",
            get(handlers::get_thread).delete(handlers::delete_thread),
        )
        .route("/threads/:thread_id/history", get(handlers::thread_history))
        .route("/threads/:thread_id/state", post(handlers::update_state))
        .route("/threads/:thread_id/proceed", post(handlers::proceed))
        .layer(middleware::logging_layer())
        .layer(middleware::cors_layer())
        .with_state(state)
}
