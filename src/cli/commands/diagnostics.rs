//! Diagnostics command implementation

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::App;
use crate::cli::commands::Session;
use crate::cli::location::absolute_file;
use crate::cli::response::DiagnosticsResponse;
use crate::models::document::TextDocument;

#[derive(Args, Debug)]
pub struct DiagnosticsArgs {
    /// Lean file to check
    pub file: PathBuf,

    /// How long to collect diagnostics (milliseconds)
    #[arg(long, default_value = "10000")]
    pub wait_ms: u64,
}

pub async fn execute(args: DiagnosticsArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let file = absolute_file(&args.file)?;

    let document = TextDocument::from_path(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut session = Session::start(app).await?;
    session.client.open_document(&document).await?;
    session
        .wait_for_diagnostics(&document.uri, Duration::from_millis(args.wait_ms))
        .await;

    let result = session.client.published_diagnostics(&document.uri).await;
    session.finish().await;

    ctx.report(
        result.map(|diagnostics| DiagnosticsResponse::new(ctx.relative_path(&file), &diagnostics)),
    );
    Ok(())
}
