//! Goal command implementation

use anyhow::{Context, Result};
use clap::Args;

use crate::app::App;
use crate::cli::commands::Session;
use crate::cli::location::ParsedLocation;
use crate::cli::response::GoalResponse;
use crate::models::document::TextDocument;

#[derive(Args, Debug)]
pub struct GoalArgs {
    /// Location (file:line:column, 1-indexed)
    pub location: String,
}

pub async fn execute(args: GoalArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let loc = ParsedLocation::parse_absolute(&args.location)?;

    let document = TextDocument::from_path(&loc.file)
        .await
        .with_context(|| format!("Failed to read {}", loc.file.display()))?;
    loc.validate_position_with_content(&document.text)?;

    let session = Session::start(app).await?;
    session.client.open_document(&document).await?;

    let result = session
        .client
        .request_plain_goals(&document.uri, loc.position())
        .await;
    session.finish().await;

    ctx.report(result.map(|goal| GoalResponse {
        file: ctx.relative_path(&loc.file),
        line: loc.line,
        column: loc.column,
        goal,
    }));
    Ok(())
}
