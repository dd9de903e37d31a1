//! Config command implementation

use std::collections::BTreeMap;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::App;
use crate::models::config::LeanConfig;
use crate::services::config::{ConfigService, active_env_overrides};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init {
        /// Write the global config (~/.config/lean-client) instead of the project one
        #[arg(long)]
        global: bool,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration and where it came from
    Show {
        /// Show the global file only, without project file or environment
        #[arg(long)]
        global: bool,
    },

    /// Show config file locations
    Path,
}

#[derive(Serialize)]
struct ConfigFile {
    path: String,
    exists: bool,
}

#[derive(Serialize)]
struct ConfigSources {
    global: ConfigFile,
    project: ConfigFile,
}

#[derive(Serialize)]
struct EffectiveConfig {
    level: &'static str,
    config: LeanConfig,
    /// Environment variables that overrode file values
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env_overrides: BTreeMap<&'static str, String>,
    /// `LEAN_SERVER_LOG_DIR` the server will be started with, if any
    server_log_dir: Option<String>,
}

impl EffectiveConfig {
    fn new(
        level: &'static str,
        config: LeanConfig,
        env_overrides: Vec<(&'static str, String)>,
    ) -> Self {
        Self {
            level,
            server_log_dir: config
                .server
                .logging_dir()
                .map(|dir| dir.display().to_string()),
            config,
            env_overrides: env_overrides.into_iter().collect(),
        }
    }
}

#[derive(Serialize)]
struct InitializedConfig {
    created: String,
    level: &'static str,
}

fn sources(app: &App) -> ConfigSources {
    let file = |global: bool| {
        let path = app.config_service.config_path(global);
        ConfigFile {
            exists: path.exists(),
            path: path.display().to_string(),
        }
    };
    ConfigSources {
        global: file(true),
        project: file(false),
    }
}

pub async fn execute(args: ConfigArgs, app: &App) -> Result<()> {
    let ctx = &app.output;

    match args.command {
        ConfigCommand::Init { global, force } => {
            let result = app
                .config_service
                .init(global, force)
                .await
                .map(|path| InitializedConfig {
                    created: ctx.relative_path(&path),
                    level: if global { "global" } else { "project" },
                });
            ctx.report(result);
        }

        ConfigCommand::Show { global: true } => {
            let result = app
                .config_service
                .load(true)
                .await
                .map(|config| EffectiveConfig::new("global", config, Vec::new()));
            ctx.report(result);
        }

        ConfigCommand::Show { global: false } => {
            let overrides = active_env_overrides(|key| std::env::var(key).ok());
            ctx.report(Ok::<_, anyhow::Error>(EffectiveConfig::new(
                "effective",
                app.config().clone(),
                overrides,
            )));
        }

        ConfigCommand::Path => ctx.report(Ok::<_, anyhow::Error>(sources(app))),
    }

    Ok(())
}
