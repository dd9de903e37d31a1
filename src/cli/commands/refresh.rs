//! Refresh command implementation
//!
//! Opens a file, then closes and reopens it so the server re-elaborates it
//! against freshly built imports.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::app::App;
use crate::cli::commands::Session;
use crate::cli::location::absolute_file;
use crate::cli::response::DiagnosticsResponse;
use crate::models::document::TextDocument;

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Lean file whose imports changed
    pub file: PathBuf,

    /// How long to collect diagnostics after the refresh (milliseconds)
    #[arg(long, default_value = "10000")]
    pub wait_ms: u64,
}

#[derive(Serialize)]
struct RefreshResponse {
    refreshed: bool,
    #[serde(flatten)]
    diagnostics: DiagnosticsResponse,
}

pub async fn execute(args: RefreshArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let file = absolute_file(&args.file)?;

    let document = TextDocument::from_path(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut session = Session::start(app).await?;
    session.client.open_document(&document).await?;

    // Re-read: the file may have been rebuilt since it was opened
    let current = TextDocument::from_path(&file).await?;
    session.client.refresh_file_dependencies(&current).await?;
    session
        .wait_for_diagnostics(&current.uri, Duration::from_millis(args.wait_ms))
        .await;

    let result = session.client.published_diagnostics(&current.uri).await;
    session.finish().await;

    ctx.report(result.map(|diagnostics| RefreshResponse {
        refreshed: true,
        diagnostics: DiagnosticsResponse::new(ctx.relative_path(&file), &diagnostics),
    }));
    Ok(())
}
