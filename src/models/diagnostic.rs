//! Diagnostic model for LSP integration
//!
//! Diagnostics are passed through exactly as the server sent them: the
//! common fields are typed, everything else (Lean's `fullRange`, `code`,
//! `relatedInformation`, ...) is kept verbatim in `extra`. A severity code
//! outside the LSP range is kept in `extra` too, so one odd entry never
//! drops the rest of a publication.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::lsp::{Position, Range};

/// LSP diagnostic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDiagnostic")]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<DiagnosticSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Diagnostic {
    pub fn new(range: Range, severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            severity: Some(severity),
            source: None,
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Start of the range, or the top of the file when there is none
    pub fn start(&self) -> Position {
        self.range.map(|r| r.start).unwrap_or_default()
    }

    pub fn end(&self) -> Position {
        self.range.map(|r| r.end).unwrap_or_default()
    }

    pub fn display_line(&self) -> u32 {
        self.start().line + 1
    }

    pub fn display_column(&self) -> u32 {
        self.start().character + 1
    }

    /// Missing or unrecognized severities count as errors
    pub fn effective_severity(&self) -> DiagnosticSeverity {
        self.severity.unwrap_or(DiagnosticSeverity::Error)
    }
}

/// Wire shape, before the severity code is checked
#[derive(Deserialize)]
struct RawDiagnostic {
    #[serde(default)]
    range: Option<Range>,
    #[serde(default)]
    severity: Option<Value>,
    #[serde(default)]
    source: Option<String>,
    message: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<RawDiagnostic> for Diagnostic {
    fn from(raw: RawDiagnostic) -> Self {
        let mut extra = raw.extra;
        let severity = raw.severity.and_then(|value| {
            serde_json::from_value::<DiagnosticSeverity>(value.clone())
                .map_err(|_| {
                    tracing::debug!("Keeping unrecognized diagnostic severity {}", value);
                    extra.insert("severity".to_string(), value);
                })
                .ok()
        });

        Self {
            range: raw.range,
            severity,
            source: raw.source,
            message: raw.message,
            extra,
        }
    }
}

/// Severity levels (LSP standard - integer values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Information => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

/// Diagnostics published for one document, as seen by event listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticEvent {
    pub fn new(uri: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            uri: uri.into(),
            diagnostics,
        }
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.effective_severity() == DiagnosticSeverity::Error)
            .count()
    }
}
