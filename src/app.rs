//! Application container for lean-client

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::OutputContext;
use crate::client::LeanClient;
use crate::models::config::LeanConfig;
use crate::services::config::{ConfigService, DefaultConfigService};

pub struct App {
    root: PathBuf,
    pub(crate) output: OutputContext,
    pub(crate) config_service: Arc<dyn ConfigService>,
    pub(crate) config: LeanConfig,
}

impl App {
    pub async fn new() -> anyhow::Result<Self> {
        let root = std::env::current_dir()?;
        Self::with_root(root).await
    }

    pub async fn with_root(root: PathBuf) -> anyhow::Result<Self> {
        tracing::debug!("Initializing lean-client at {:?}", root);

        let output = OutputContext::new(root.clone());
        let config_service = Arc::new(DefaultConfigService::new(&root));
        let config = config_service.load(false).await?;

        Ok(Self {
            root,
            output,
            config_service,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &LeanConfig {
        &self.config
    }

    /// A stopped client for the configured Lean executable
    pub fn client(&self) -> LeanClient {
        LeanClient::with_stdio(self.config.server.clone(), self.root.clone())
    }
}
