//! Server and CLI configuration

mod loader;
mod schema;

pub use loader::{ConfigLoader, ENV_DATABASE_PATH, ENV_HOST, ENV_LOG_LEVEL, ENV_PORT};
pub use schema::{DatabaseConfig, EngineSection, HitlConfig, LogFormat, LoggingConfig, ServerConfig};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
