//! Configuration model for lean-client
//!
//! Mirrors the Lean editor settings that affect the server process:
//! `lean4.executablePath`, `lean4.serverLogging.enabled` and
//! `lean4.serverLogging.path`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// lean-client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LeanConfig {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Language server process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::executable_path")]
    pub executable_path: String,

    /// Grace period for the shutdown handshake and process exit
    #[serde(default = "defaults::shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    #[serde(default)]
    pub logging: ServerLoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            executable_path: defaults::executable_path(),
            shutdown_timeout_secs: defaults::shutdown_timeout_secs(),
            logging: ServerLoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Directory handed to the server as `LEAN_SERVER_LOG_DIR`, if logging is on
    pub fn logging_dir(&self) -> Option<&Path> {
        self.logging
            .enabled
            .then_some(self.logging.path.as_path())
    }
}

/// Server-side logging (written by the Lean server itself)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerLoggingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "defaults::logging_path")]
    pub path: PathBuf,
}

impl Default for ServerLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: defaults::logging_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn executable_path() -> String {
        "lean".to_string()
    }
    pub fn shutdown_timeout_secs() -> u64 {
        5
    }
    pub fn logging_path() -> PathBuf {
        PathBuf::from(".")
    }
}
