//! Configuration service for lean-client

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::models::config::LeanConfig;

pub const ENV_EXECUTABLE_PATH: &str = "LEAN4_EXECUTABLE_PATH";
pub const ENV_LOGGING_ENABLED: &str = "LEAN4_SERVER_LOGGING_ENABLED";
pub const ENV_LOGGING_PATH: &str = "LEAN4_SERVER_LOGGING_PATH";

const ENV_OVERRIDES: [&str; 3] = [ENV_EXECUTABLE_PATH, ENV_LOGGING_ENABLED, ENV_LOGGING_PATH];

#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn load(&self, global_only: bool) -> Result<LeanConfig, ConfigError>;
    fn config_path(&self, global: bool) -> PathBuf;
    async fn init(&self, global: bool, force: bool) -> Result<PathBuf, ConfigError>;
}

pub struct DefaultConfigService {
    root: PathBuf,
    global_path: PathBuf,
}

impl DefaultConfigService {
    pub fn new(root: &Path) -> Self {
        Self::with_global_path(root, Self::global_config_path())
    }

    pub fn with_global_path(root: &Path, global_path: PathBuf) -> Self {
        Self {
            root: root.to_path_buf(),
            global_path,
        }
    }

    fn global_config_path() -> PathBuf {
        // XDG standard: ~/.config/lean-client/config.toml
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lean-client")
            .join("config.toml")
    }

    fn project_config_path(&self) -> PathBuf {
        self.root.join(".lean-client").join("config.toml")
    }

    async fn load_from_path(path: &Path) -> Result<Option<LeanConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path).await?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// `load` with an explicit environment, so precedence can be tested
    pub async fn load_with_env<F>(&self, global_only: bool, lookup: F) -> Result<LeanConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String> + Send,
    {
        let global = Self::load_from_path(&self.global_path).await?;
        if global_only {
            return Ok(global.unwrap_or_default());
        }

        // A project file replaces the global one wholesale
        let project = Self::load_from_path(&self.project_config_path()).await?;
        let config = project.or(global).unwrap_or_default();
        apply_env_overrides(config, lookup)
    }

    async fn write_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let config = LeanConfig::default();
        let content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigService for DefaultConfigService {
    async fn load(&self, global_only: bool) -> Result<LeanConfig, ConfigError> {
        self.load_with_env(global_only, |key| std::env::var(key).ok())
            .await
    }

    fn config_path(&self, global: bool) -> PathBuf {
        if global {
            self.global_path.clone()
        } else {
            self.project_config_path()
        }
    }

    async fn init(&self, global: bool, force: bool) -> Result<PathBuf, ConfigError> {
        let path = self.config_path(global);

        if path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                key: "config".to_string(),
                message: format!(
                    "Config already exists: {}. Use --force to overwrite.",
                    path.display()
                ),
            });
        }

        Self::write_default_config(&path).await?;
        Ok(path)
    }
}

/// Override variables that are currently set, with their values
pub fn active_env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, String)> {
    ENV_OVERRIDES
        .iter()
        .filter_map(|key| lookup(key).map(|value| (*key, value)))
        .collect()
}

fn apply_env_overrides(
    mut config: LeanConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LeanConfig, ConfigError> {
    if let Some(val) = lookup(ENV_EXECUTABLE_PATH).filter(|v| !v.is_empty()) {
        config.server.executable_path = val;
    }
    if let Some(val) = lookup(ENV_LOGGING_ENABLED) {
        config.server.logging.enabled = parse_bool(ENV_LOGGING_ENABLED, &val)?;
    }
    if let Some(val) = lookup(ENV_LOGGING_PATH).filter(|v| !v.is_empty()) {
        config.server.logging.path = PathBuf::from(val);
    }
    Ok(config)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}
