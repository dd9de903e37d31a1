//! Response types for CLI output

use serde::Serialize;

use crate::models::diagnostic::Diagnostic;
use crate::models::goal::PlainGoal;

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticOutput {
    pub severity: String,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&Diagnostic> for DiagnosticOutput {
    fn from(d: &Diagnostic) -> Self {
        let (end_line, end_column) = d.end().to_display();
        Self {
            severity: d.effective_severity().to_string(),
            message: d.message.clone(),
            line: d.display_line(),
            column: d.display_column(),
            end_line,
            end_column,
            source: d.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsResponse {
    pub file: String,
    pub count: usize,
    pub errors: usize,
    pub diagnostics: Vec<DiagnosticOutput>,
}

impl DiagnosticsResponse {
    pub fn new(file: String, diagnostics: &[Diagnostic]) -> Self {
        let diagnostics: Vec<DiagnosticOutput> = diagnostics.iter().map(Into::into).collect();
        Self {
            file,
            count: diagnostics.len(),
            errors: diagnostics.iter().filter(|d| d.severity == "error").count(),
            diagnostics,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalResponse {
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// `None` when there is no goal at the position
    pub goal: Option<PlainGoal>,
}
