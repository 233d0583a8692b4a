//! # hitl-server - HTTP front end for resumable workflows
//!
//! Wires the pieces together: [`config`] loads `hitl.toml` and environment
//! overrides, [`logging`] installs the tracing subscriber, [`api`] exposes
//! the engine over HTTP. The `hitl-server` binary and `hitl serve` both go
//! through [`serve`].

pub mod api;
pub mod config;
pub mod logging;

pub use api::{create_router, ApiError, AppState};
pub use config::{ConfigError, ConfigLoader, HitlConfig};

use hitl_checkpoint::{CheckpointError, SqliteCheckpointStore};
use hitl_core::{Engine, GraphError};
use hitl_workflows::{builtin_registry, Collaborators};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] CheckpointError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open the configured database and register the bundled workflows
pub async fn build_state(
    config: &HitlConfig,
    collaborators: &Collaborators,
) -> Result<AppState, ServerError> {
    let path = config.database_path();
    info!(path = %path.display(), "Opening checkpoint database");
    let store = SqliteCheckpointStore::connect(&path).await?;
    store.health_check().await?;

    let engine = Engine::with_config(Arc::new(store), config.engine_config());
    let registry = builtin_registry(collaborators)?;
    info!(workflows = registry.len(), "Workflows registered");
    Ok(AppState::new(engine, registry))
}

/// Serve the API until Ctrl-C or SIGTERM
pub async fn serve(config: &HitlConfig, state: AppState) -> Result<(), ServerError> {
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %listener.local_addr()?, "HITL server listening");

    axum::serve(listener, create_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HITL server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
