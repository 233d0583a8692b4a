//! Configuration schema (`hitl.toml`)
//!
//! ```toml
//! [database]
//! path = "hitl.db"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [engine]
//! max_steps_per_run = 100
//!
//! [logging]
//! level = "info"
//! format = "compact"   # compact | pretty | json
//! ```

use hitl_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HitlConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Checkpoint database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, absolute or relative to `~/.hitl`
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "hitl.db".to_string(),
        }
    }
}

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Steps one start/resume call may run before it is aborted
    pub max_steps_per_run: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_steps_per_run: EngineConfig::default().max_steps_per_run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `hitl_core=debug,info`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl HitlConfig {
    /// Resolved database file
    ///
    /// Relative paths live under `~/.hitl`; without a home directory they
    /// are used as given.
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.path);
        if path.is_absolute() {
            return path;
        }
        match dirs::home_dir() {
            Some(home) => home.join(".hitl").join(path),
            None => path,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_steps_per_run: self.engine.max_steps_per_run,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
