//! Standalone HTTP server
//!
//! Reads `hitl.toml` (or the file named by `HITL_CONFIG`) plus environment
//! overrides, then serves the API on the configured address.

use anyhow::Context;
use hitl_server::{build_state, logging, serve, ConfigLoader};
use hitl_workflows::Collaborators;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loader = match std::env::var("HITL_CONFIG") {
        Ok(path) => ConfigLoader::new().with_config_file(path),
        Err(_) => ConfigLoader::new(),
    };
    let config = loader.load().await.context("loading configuration")?;
    logging::init_logging(&config.logging)?;

    tracing::info!(
        database = %config.database_path().display(),
        address = %config.bind_address(),
        max_steps_per_run = config.engine.max_steps_per_run,
        "Configuration loaded"
    );

    let state = build_state(&config, &Collaborators::offline())
        .await
        .context("initialising engine")?;
    serve(&config, state).await?;
    Ok(())
}
