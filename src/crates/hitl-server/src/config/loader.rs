//! Layered configuration loading
//!
//! Sources, later ones winning field by field:
//! 1. Built-in defaults
//! 2. User config: `~/.hitl/hitl.toml`
//! 3. Project config: `./hitl.toml`, or the file given with `--config`
//! 4. Environment: `HITL_DATABASE_PATH`, `HITL_HOST`, `HITL_PORT`, `HITL_LOG_LEVEL`
//!
//! Missing user/project files are skipped; an explicit `--config` file
//! must exist.

use super::schema::HitlConfig;
use super::ConfigError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub const ENV_DATABASE_PATH: &str = "HITL_DATABASE_PATH";
pub const ENV_HOST: &str = "HITL_HOST";
pub const ENV_PORT: &str = "HITL_PORT";
pub const ENV_LOG_LEVEL: &str = "HITL_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(".hitl").join("hitl.toml")),
            project_config_path: PathBuf::from("hitl.toml"),
            explicit: false,
        }
    }

    /// Use `path` instead of `./hitl.toml`; it must exist
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config_path = path.into();
        self.explicit = true;
        self
    }

    /// Override (or with `None`, skip) the user-level file
    pub fn with_user_config(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }

    /// Files plus process environment
    pub async fn load(&self) -> Result<HitlConfig, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok()).await
    }

    /// Files plus environment values supplied by `lookup`
    pub async fn load_with_env<F>(&self, lookup: F) -> Result<HitlConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        if let Some(user) = &self.user_config_path {
            if let Some(layer) = read_layer(user, false).await? {
                debug!(path = %user.display(), "Loaded user-level config");
                merge_tables(&mut merged, layer);
            }
        }
        if let Some(layer) = read_layer(&self.project_config_path, self.explicit).await? {
            debug!(path = %self.project_config_path.display(), "Loaded project-level config");
            merge_tables(&mut merged, layer);
        }

        let mut config: HitlConfig = merged.try_into().map_err(|e: toml::de::Error| ConfigError::Parse {
            path: self.project_config_path.clone(),
            message: e.to_string(),
        })?;
        apply_env(&mut config, lookup)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_layer(path: &Path, required: bool) -> Result<Option<toml::Value>, ConfigError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!(path = %path.display(), "Config file not present");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let value = toml::from_str::<toml::Value>(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Recursive table merge, `overlay` wins
fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_table() && value.is_table() => {
                        merge_tables(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env<F>(config: &mut HitlConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(ENV_DATABASE_PATH) {
        config.database.path = path;
    }
    if let Some(host) = lookup(ENV_HOST) {
        config.server.host = host;
    }
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} must be a port number, got '{}'", ENV_PORT, port)))?;
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn isolated(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::new()
            .with_user_config(Some(dir.path().join("user.toml")))
            .with_config_file(dir.path().join("missing.toml"))
    }

    #[tokio::test]
    async fn test_defaults_when_no_files() {
        let dir = TempDir::new().unwrap();
        let mut loader = isolated(&dir);
        loader.explicit = false;
        let config = loader.load_with_env(no_env).await.unwrap();
        assert_eq!(config, HitlConfig::default());
    }

    #[tokio::test]
    async fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = isolated(&dir).load_with_env(no_env).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test]
    async fn test_project_overrides_user_field_by_field() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let project = dir.path().join("hitl.toml");
        fs::write(
            &user,
            "[database]\npath = \"/var/lib/hitl/user.db\"\n\n[server]\nhost = \"0.0.0.0\"\nport = 7000\n",
        )
        .await
        .unwrap();
        fs::write(&project, "[server]\nport = 9000\n\n[logging]\nformat = \"pretty\"\n")
            .await
            .unwrap();

        let config = ConfigLoader::new()
            .with_user_config(Some(user))
            .with_config_file(project)
            .load_with_env(no_env)
            .await
            .unwrap();

        assert_eq!(config.database.path, "/var/lib/hitl/user.db");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[tokio::test]
    async fn test_env_overrides_files() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("hitl.toml");
        fs::write(&project, "[server]\nport = 9000\n").await.unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_PORT, "9100"),
            (ENV_DATABASE_PATH, "/tmp/env.db"),
            (ENV_LOG_LEVEL, "debug"),
        ]
        .into_iter()
        .collect();
        let config = ConfigLoader::new()
            .with_user_config(None)
            .with_config_file(project)
            .load_with_env(|key| env.get(key).map(|v| v.to_string()))
            .await
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.database.path, "/tmp/env.db");
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_bad_values_are_reported() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("hitl.toml");
        fs::write(&project, "[server]\nport = \"eighty\"\n").await.unwrap();
        let loader = ConfigLoader::new()
            .with_user_config(None)
            .with_config_file(&project);
        assert!(matches!(
            loader.load_with_env(no_env).await.unwrap_err(),
            ConfigError::Parse { .. }
        ));

        fs::write(&project, "").await.unwrap();
        let err = loader
            .load_with_env(|key| (key == ENV_PORT).then(|| "http".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
