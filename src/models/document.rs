//! Host-side document snapshots

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::lsp::{path_to_uri, uri_scheme};

pub const LEAN_LANGUAGE_ID: &str = "lean4";

/// A text document as the host currently sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocument {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl TextDocument {
    pub fn new(uri: impl Into<String>, language_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            version: 1,
            text: text.into(),
        }
    }

    /// Lean document with the given contents
    pub fn lean(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(uri, LEAN_LANGUAGE_ID, text)
    }

    /// Load a document from disk
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(path_to_uri(path), language_id_for(path), text))
    }

    pub fn scheme(&self) -> Option<&str> {
        uri_scheme(&self.uri)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self.version += 1;
        self
    }
}

/// Language id from the file extension
pub fn language_id_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("lean") => LEAN_LANGUAGE_ID,
        Some("md") => "markdown",
        _ => "plaintext",
    }
}
