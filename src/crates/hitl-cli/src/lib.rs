//! # hitl-cli
//!
//! The `hitl` command. Every command opens the configured checkpoint
//! database, so a thread started by one process can be resumed by another:
//!
//! ```text
//! $ hitl run purchase_stock order-1 '{"stock":"WIPRO","price":239.7,"quantity":50}'
//! $ hitl resume order-1 yes
//! ```
//!
//! Results are printed to stdout as JSON; failures are reported on stderr
//! and through the exit code (see [`exit`]).

pub mod cli;
pub mod exit;

pub use cli::{Cli, Commands};

use anyhow::Context;
use hitl_server::api::models::RunResponse;
use hitl_server::{build_state, serve, ConfigLoader, HitlConfig};
use hitl_workflows::Collaborators;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Problems with command-line arguments that clap cannot catch
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{what} is not valid JSON: {source}")]
    InvalidJson {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Resolve configuration from files, environment and global flags
pub async fn load_config(cli: &Cli) -> anyhow::Result<HitlConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_config_file(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().await?;
    if let Some(database) = &cli.database {
        config.database.path = database.to_string_lossy().into_owned();
    }
    Ok(config)
}

/// Run one command; `None` means there is nothing to print
pub async fn execute(cli: Cli, mut config: HitlConfig) -> anyhow::Result<Option<Value>> {
    let state = build_state(&config, &Collaborators::offline()).await?;

    let output = match cli.command {
        Commands::Run {
            workflow,
            thread_id,
            input,
        } => {
            let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let input = match input {
                Some(raw) => parse_json("input", &raw)?,
                None => Value::Null,
            };
            let workflow = state.registry.get(&workflow)?;
            let result = workflow
                .start(&state.engine, &thread_id, input)
                .await
                .with_context(|| format!("starting thread '{thread_id}'"))?;
            to_value(RunResponse::from(result))?
        }
        Commands::Resume {
            thread_id,
            decision,
            expected_sequence,
        } => {
            let decision = parse_decision(&decision);
            debug!(thread_id = %thread_id, decision = %decision, "Resuming");
            let result = state
                .registry
                .resume(&state.engine, &thread_id, decision, expected_sequence)
                .await
                .with_context(|| format!("resuming thread '{thread_id}'"))?;
            to_value(RunResponse::from(result))?
        }
        Commands::Status { thread_id } => to_value(state.engine.snapshot(&thread_id).await?)?,
        Commands::History { thread_id, limit } => {
            to_value(state.engine.history(&thread_id, limit).await?)?
        }
        Commands::Delete { thread_id } => {
            let removed = state.engine.delete_thread(&thread_id).await?;
            json!({"status": "deleted", "thread_id": thread_id, "removed": removed})
        }
        Commands::Workflows => to_value(state.registry.list())?,
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config, state).await?;
            return Ok(None);
        }
    };
    Ok(Some(output))
}

fn parse_json(what: &'static str, raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|source| CliError::InvalidJson { what, source })
}

/// `yes`, `"yes"` and `{"approved": true}` are all accepted on the command line
pub fn parse_decision(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}
