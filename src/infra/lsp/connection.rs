//! Connection seam between the lifecycle manager and a language server
//!
//! `LeanClient` only talks to `Launcher` and `Connection`. The stdio
//! implementation lives in `stdio.rs`; tests plug in recording doubles.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientResult;
use crate::models::diagnostic::{Diagnostic, DiagnosticEvent};
use crate::models::document::TextDocument;

/// Intercepts `publishDiagnostics`. Call `next` to hand the event to the
/// connection's default path.
pub type DiagnosticsMiddleware =
    Arc<dyn Fn(DiagnosticEvent, &mut dyn FnMut(DiagnosticEvent)) + Send + Sync>;

/// A live session with a language server
#[async_trait]
pub trait Connection: Send + Sync {
    /// Queue a notification. Notifications from one caller are delivered in
    /// the order they were queued; nothing waits for the server.
    fn send_notification(&self, method: &str, params: Value) -> ClientResult<()>;

    /// Send a request and wait for its single response
    async fn send_request(&self, method: &str, params: Value) -> ClientResult<Value>;

    /// Latest diagnostics the default path received for `uri`
    async fn diagnostics(&self, uri: &str) -> Vec<Diagnostic>;

    /// Graceful shutdown. The connection is unusable afterwards, even on error.
    async fn stop(&self) -> ClientResult<()>;
}

/// Creates connections; one call per `start`/`restart`
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(
        &self,
        server: ServerOptions,
        client: ClientOptions,
    ) -> ClientResult<Arc<dyn Connection>>;
}

/// How to run the server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Added on top of the inherited host environment
    pub env: HashMap<String, String>,
}

impl ServerOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Selects the documents a connection is responsible for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentFilter {
    pub scheme: Option<String>,
    pub language: Option<String>,
}

impl DocumentFilter {
    pub fn new(scheme: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            scheme: Some(scheme.into()),
            language: Some(language.into()),
        }
    }

    pub fn matches(&self, document: &TextDocument) -> bool {
        let scheme_ok = self
            .scheme
            .as_deref()
            .is_none_or(|s| document.scheme() == Some(s));
        let language_ok = self
            .language
            .as_deref()
            .is_none_or(|l| document.language_id == l);
        scheme_ok && language_ok
    }
}

/// Protocol-side configuration handed to the launcher
#[derive(Clone, Default)]
pub struct ClientOptions {
    pub id: String,
    pub name: String,
    pub document_selector: Vec<DocumentFilter>,
    pub handle_diagnostics: Option<DiagnosticsMiddleware>,
}

impl ClientOptions {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn selects(&self, document: &TextDocument) -> bool {
        self.document_selector.iter().any(|f| f.matches(document))
    }

    /// Route a diagnostics publication through the middleware, if any
    pub fn deliver_diagnostics(&self, event: DiagnosticEvent, mut next: impl FnMut(DiagnosticEvent)) {
        match &self.handle_diagnostics {
            Some(handler) => handler(event, &mut next),
            None => next(event),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("document_selector", &self.document_selector)
            .field("handle_diagnostics", &self.handle_diagnostics.is_some())
            .finish()
    }
}
