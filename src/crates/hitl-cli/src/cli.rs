//! Argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hitl")]
#[command(about = "Run and resume human-in-the-loop workflows", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (replaces ./hitl.toml)
    #[arg(long, global = true, env = "HITL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Checkpoint database, overriding the configured path
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a workflow on a thread
    Run {
        /// Workflow name, see `hitl workflows`
        workflow: String,

        /// Thread id (generated when omitted)
        thread_id: Option<String>,

        /// Initial input as a JSON object
        input: Option<String>,
    },

    /// Answer the decision a paused thread is waiting for
    Resume {
        thread_id: String,

        /// JSON value; anything that does not parse is sent as a string
        decision: String,

        /// Refuse unless the thread is still at this checkpoint sequence
        #[arg(long)]
        expected_sequence: Option<u64>,
    },

    /// Show the latest snapshot of a thread
    Status { thread_id: String },

    /// List a thread's checkpoints, newest first
    History {
        thread_id: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete a thread and all its checkpoints
    Delete { thread_id: String },

    /// List the registered workflows
    Workflows,

    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
}
