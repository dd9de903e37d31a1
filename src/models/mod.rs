//! Data models for lean-client
//!
//! Contains core type definitions used throughout the crate.

pub mod config;
pub mod diagnostic;
pub mod document;
pub mod goal;
pub mod lsp;

// Re-export commonly used types
pub use config::LeanConfig;
pub use diagnostic::{Diagnostic, DiagnosticEvent, DiagnosticSeverity};
pub use document::TextDocument;
pub use goal::PlainGoal;
pub use lsp::{Position, Range};
