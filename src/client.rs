//! Lean 4 language client lifecycle manager
//!
//! `LeanClient` owns at most one live connection to a Lean server, re-emits
//! the diagnostics it publishes, and forwards the Lean-specific requests the
//! host needs. Start, stop and restart are serialized; forwarding calls only
//! read the current handle.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};

use crate::error::{ClientError, ClientResult};
use crate::events::{EventEmitter, ListenerId};
use crate::infra::lsp::connection::{
    ClientOptions, Connection, DiagnosticsMiddleware, DocumentFilter, Launcher, ServerOptions,
};
use crate::infra::lsp::protocol::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, VersionedTextDocumentIdentifier, methods,
};
use crate::infra::lsp::stdio::StdioLauncher;
use crate::models::config::ServerConfig;
use crate::models::diagnostic::{Diagnostic, DiagnosticEvent};
use crate::models::document::{LEAN_LANGUAGE_ID, TextDocument};
use crate::models::goal::PlainGoal;
use crate::models::lsp::Position;

pub const CLIENT_ID: &str = "lean4";
pub const CLIENT_NAME: &str = "Lean 4";
pub const SERVER_LOG_DIR_ENV: &str = "LEAN_SERVER_LOG_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Stopped = 0,
    Started = 1,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Started,
            _ => Self::Stopped,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Identity of one connection. Every successful start hands out a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Active {
    id: ConnectionId,
    connection: Arc<dyn Connection>,
}

#[derive(Debug, Clone)]
struct OpenDocument {
    language_id: String,
    version: i32,
    text: String,
}

pub struct LeanClient {
    config: ServerConfig,
    root: PathBuf,
    launcher: Arc<dyn Launcher>,
    selector: Vec<DocumentFilter>,
    state: AtomicU8,
    active: RwLock<Option<Active>>,
    lifecycle: Mutex<()>,
    next_connection_id: AtomicU64,
    documents: parking_lot::Mutex<HashMap<String, OpenDocument>>,
    restarted: EventEmitter<()>,
    diagnostics: Arc<EventEmitter<DiagnosticEvent>>,
}

impl LeanClient {
    pub fn new(config: ServerConfig, root: impl Into<PathBuf>, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config,
            root: root.into(),
            launcher,
            selector: vec![DocumentFilter::new("file", LEAN_LANGUAGE_ID)],
            state: AtomicU8::new(LifecycleState::Stopped.to_u8()),
            active: RwLock::new(None),
            lifecycle: Mutex::new(()),
            next_connection_id: AtomicU64::new(1),
            documents: parking_lot::Mutex::new(HashMap::new()),
            restarted: EventEmitter::new(),
            diagnostics: Arc::new(EventEmitter::new()),
        }
    }

    /// Client that runs the configured executable over stdio
    pub fn with_stdio(config: ServerConfig, root: impl Into<PathBuf>) -> Self {
        let launcher = Arc::new(StdioLauncher::new(config.shutdown_timeout()));
        Self::new(config, root, launcher)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    pub async fn connection_id(&self) -> Option<ConnectionId> {
        self.active.read().await.as_ref().map(|a| a.id)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn start(&self) -> ClientResult<()> {
        self.restart().await
    }

    /// Stop the current server (if any), then launch a new one.
    ///
    /// Fires `restarted` once the new connection is in place. A failed stop
    /// aborts the restart; a failed launch leaves the client stopped.
    pub async fn restart(&self) -> ClientResult<()> {
        let _guard = self.lifecycle.lock().await;

        if self.is_started() {
            self.stop_locked().await?;
        }

        let server = self.server_options();
        let client = self.client_options();
        tracing::info!(
            "Starting {} server: {} {}",
            CLIENT_NAME,
            server.command,
            server.args.join(" ")
        );

        let connection = self.launcher.launch(server, client).await?;
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));

        *self.active.write().await = Some(Active {
            id,
            connection: Arc::clone(&connection),
        });
        self.set_state(LifecycleState::Started);

        self.reopen_documents(connection.as_ref());

        tracing::info!("{} server started (connection {})", CLIENT_NAME, id);
        self.restarted.fire(&());
        Ok(())
    }

    pub async fn stop(&self) -> ClientResult<()> {
        let _guard = self.lifecycle.lock().await;

        if !self.is_started() {
            return Err(ClientError::NotStarted);
        }
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> ClientResult<()> {
        let current = self
            .active
            .read()
            .await
            .as_ref()
            .map(|a| (a.id, Arc::clone(&a.connection)));
        let Some((id, connection)) = current else {
            self.set_state(LifecycleState::Stopped);
            return Err(ClientError::NotStarted);
        };

        tracing::info!("Stopping {} server (connection {})", CLIENT_NAME, id);
        let result = connection.stop().await;

        // The connection is torn down either way
        *self.active.write().await = None;
        self.set_state(LifecycleState::Stopped);

        if let Err(e) = &result {
            tracing::warn!("{} server did not stop cleanly: {}", CLIENT_NAME, e);
        }
        result
    }

    fn server_options(&self) -> ServerOptions {
        let mut options = ServerOptions::new(&self.config.executable_path)
            .arg("--server")
            .cwd(&self.root);

        if let Some(dir) = self.config.logging_dir() {
            options = options.env(SERVER_LOG_DIR_ENV, dir.to_string_lossy());
        }
        options
    }

    fn client_options(&self) -> ClientOptions {
        let diagnostics = Arc::clone(&self.diagnostics);
        let middleware: DiagnosticsMiddleware = Arc::new(
            move |event: DiagnosticEvent, next: &mut dyn FnMut(DiagnosticEvent)| {
                next(event.clone());
                diagnostics.fire(&event);
            },
        );

        let mut options = ClientOptions::new(CLIENT_ID, CLIENT_NAME);
        options.document_selector = self.selector.clone();
        options.handle_diagnostics = Some(middleware);
        options
    }

    fn reopen_documents(&self, connection: &dyn Connection) {
        let mut documents = self.documents.lock();
        for (uri, doc) in documents.iter_mut() {
            doc.version = 1;
            let params = DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: doc.language_id.clone(),
                    version: doc.version,
                    text: doc.text.clone(),
                },
            };
            let sent = serde_json::to_value(params)
                .map_err(ClientError::from)
                .and_then(|params| connection.send_notification(methods::DID_OPEN, params));
            if let Err(e) = sent {
                tracing::warn!("Failed to reopen {}: {}", uri, e);
            }
        }
        if !documents.is_empty() {
            tracing::debug!("Reopened {} documents", documents.len());
        }
    }

    async fn connection(&self) -> ClientResult<Arc<dyn Connection>> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|a| Arc::clone(&a.connection))
            .ok_or(ClientError::NotStarted)
    }

    // ========================================================================
    // Lean requests
    // ========================================================================

    /// Close and reopen `document` so the server rebuilds it against the
    /// current state of its imports.
    ///
    /// The reopen starts a new session for the document, so its version goes
    /// back to 1.
    pub async fn refresh_file_dependencies(&self, document: &TextDocument) -> ClientResult<()> {
        let connection = self.connection().await?;
        let uri = document.uri.clone();

        let close = serde_json::to_value(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier::new(&uri),
        })?;
        let open = serde_json::to_value(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: LEAN_LANGUAGE_ID.to_string(),
                version: 1,
                text: document.text.clone(),
            },
        })?;

        tracing::debug!("Refreshing file dependencies of {}", uri);
        let mut documents = self.documents.lock();
        connection.send_notification(methods::DID_CLOSE, close)?;
        connection.send_notification(methods::DID_OPEN, open)?;

        documents.insert(
            uri,
            OpenDocument {
                language_id: LEAN_LANGUAGE_ID.to_string(),
                version: 1,
                text: document.text.clone(),
            },
        );
        Ok(())
    }

    /// Goal state at `position`, as plain text.
    ///
    /// `None` when the server reports no goal there.
    pub async fn request_plain_goals(
        &self,
        uri: &str,
        position: Position,
    ) -> ClientResult<Option<PlainGoal>> {
        let connection = self.connection().await?;
        let params = serde_json::to_value(TextDocumentPositionParams::new(uri, position))?;

        let result = connection
            .send_request(methods::PLAIN_GOAL, params)
            .await?;

        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Invalid plainGoal response: {}", e)))
    }

    /// Latest diagnostics the current connection holds for `uri`
    pub async fn published_diagnostics(&self, uri: &str) -> ClientResult<Vec<Diagnostic>> {
        let connection = self.connection().await?;
        Ok(connection.diagnostics(uri).await)
    }

    // ========================================================================
    // Document synchronization
    // ========================================================================

    pub fn selects(&self, document: &TextDocument) -> bool {
        self.selector.iter().any(|f| f.matches(document))
    }

    /// Returns false for documents outside the selector
    pub async fn open_document(&self, document: &TextDocument) -> ClientResult<bool> {
        let connection = self.connection().await?;
        if !self.selects(document) {
            return Ok(false);
        }
        self.sync_document(connection.as_ref(), document)
    }

    /// Full-text sync. Returns false when nothing had to be sent.
    pub async fn change_document(&self, document: &TextDocument) -> ClientResult<bool> {
        let connection = self.connection().await?;
        if !self.selects(document) {
            return Ok(false);
        }
        self.sync_document(connection.as_ref(), document)
    }

    pub async fn close_document(&self, uri: &str) -> ClientResult<bool> {
        let connection = self.connection().await?;
        if self.documents.lock().remove(uri).is_none() {
            return Ok(false);
        }

        let params = serde_json::to_value(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier::new(uri),
        })?;
        connection.send_notification(methods::DID_CLOSE, params)?;
        tracing::debug!("Closed {}", uri);
        Ok(true)
    }

    /// didOpen for an untracked document, didChange for a tracked one.
    /// The table stays locked from lookup to insert, so concurrent callers
    /// for the same URI send a single didOpen.
    fn sync_document(&self, connection: &dyn Connection, document: &TextDocument) -> ClientResult<bool> {
        let mut documents = self.documents.lock();
        let open = match documents.entry(document.uri.clone()) {
            Entry::Vacant(slot) => {
                let params = serde_json::to_value(DidOpenTextDocumentParams {
                    text_document: TextDocumentItem {
                        uri: document.uri.clone(),
                        language_id: document.language_id.clone(),
                        version: 1,
                        text: document.text.clone(),
                    },
                })?;
                connection.send_notification(methods::DID_OPEN, params)?;

                slot.insert(OpenDocument {
                    language_id: document.language_id.clone(),
                    version: 1,
                    text: document.text.clone(),
                });
                tracing::debug!("Opened {}", document.uri);
                return Ok(true);
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };
        if open.text == document.text {
            return Ok(false);
        }

        let version = open.version + 1;
        let params = serde_json::to_value(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: document.uri.clone(),
                version,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                text: document.text.clone(),
            }],
        })?;
        connection.send_notification(methods::DID_CHANGE, params)?;

        open.version = version;
        open.text = document.text.clone();
        tracing::debug!("Changed {} (version {})", document.uri, version);
        Ok(true)
    }

    /// Version the server currently has for `uri`, if open
    pub fn document_version(&self, uri: &str) -> Option<i32> {
        self.documents.lock().get(uri).map(|d| d.version)
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn on_restarted<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&()) + Send + Sync + 'static,
    {
        self.restarted.subscribe(listener)
    }

    pub fn remove_restarted_listener(&self, id: ListenerId) -> bool {
        self.restarted.unsubscribe(id)
    }

    pub fn on_diagnostics<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&DiagnosticEvent) + Send + Sync + 'static,
    {
        self.diagnostics.subscribe(listener)
    }

    pub fn remove_diagnostics_listener(&self, id: ListenerId) -> bool {
        self.diagnostics.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    type Sent = parking_lot::Mutex<Vec<(String, Value)>>;

    struct MockConnection {
        options: ClientOptions,
        sent: Sent,
        store: parking_lot::Mutex<HashMap<String, Vec<Diagnostic>>>,
        goal: Value,
        fail_stop: bool,
        stopped: AtomicBool,
        live: Arc<AtomicUsize>,
    }

    impl MockConnection {
        fn sent(&self) -> Vec<(String, Value)> {
            self.sent.lock().clone()
        }

        fn methods(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(m, _)| m.clone()).collect()
        }

        /// Simulate the server publishing diagnostics
        fn publish(&self, event: DiagnosticEvent) {
            let mut store = self.store.lock();
            self.options.deliver_diagnostics(event, |e| {
                store.insert(e.uri, e.diagnostics);
            });
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        fn send_notification(&self, method: &str, params: Value) -> ClientResult<()> {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(ClientError::NotConnected);
            }
            self.sent.lock().push((method.to_string(), params));
            Ok(())
        }

        async fn send_request(&self, method: &str, params: Value) -> ClientResult<Value> {
            self.sent.lock().push((method.to_string(), params));
            Ok(self.goal.clone())
        }

        async fn diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
            self.store.lock().get(uri).cloned().unwrap_or_default()
        }

        async fn stop(&self) -> ClientResult<()> {
            tokio::task::yield_now().await;
            self.stopped.store(true, Ordering::SeqCst);
            self.live.fetch_sub(1, Ordering::SeqCst);
            if self.fail_stop {
                return Err(ClientError::Shutdown("shutdown request timed out".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockLauncher {
        launched: parking_lot::Mutex<Vec<Arc<MockConnection>>>,
        servers: parking_lot::Mutex<Vec<ServerOptions>>,
        live: Arc<AtomicUsize>,
        max_live: AtomicUsize,
        fail_launch: AtomicBool,
        fail_stop: AtomicBool,
        goal: parking_lot::Mutex<Value>,
    }

    impl MockLauncher {
        fn connection(&self, index: usize) -> Arc<MockConnection> {
            Arc::clone(&self.launched.lock()[index])
        }

        fn last(&self) -> Arc<MockConnection> {
            let launched = self.launched.lock();
            Arc::clone(launched.last().unwrap())
        }

        fn launch_count(&self) -> usize {
            self.launched.lock().len()
        }
    }

    #[async_trait]
    impl Launcher for MockLauncher {
        async fn launch(
            &self,
            server: ServerOptions,
            client: ClientOptions,
        ) -> ClientResult<Arc<dyn Connection>> {
            if self.fail_launch.load(Ordering::SeqCst) {
                return Err(ClientError::ServerStart(format!(
                    "{}: No such file or directory",
                    server.command
                )));
            }
            tokio::task::yield_now().await;

            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);

            let connection = Arc::new(MockConnection {
                options: client,
                sent: Sent::default(),
                store: parking_lot::Mutex::new(HashMap::new()),
                goal: self.goal.lock().clone(),
                fail_stop: self.fail_stop.load(Ordering::SeqCst),
                stopped: AtomicBool::new(false),
                live: Arc::clone(&self.live),
            });
            self.servers.lock().push(server);
            self.launched.lock().push(Arc::clone(&connection));
            Ok(connection)
        }
    }

    fn client_with(config: ServerConfig) -> (LeanClient, Arc<MockLauncher>) {
        let launcher = Arc::new(MockLauncher::default());
        let client = LeanClient::new(config, "/work/project", launcher.clone());
        (client, launcher)
    }

    fn client() -> (LeanClient, Arc<MockLauncher>) {
        client_with(ServerConfig::default())
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&()) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &()| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_lifecycle_state() {
        let (client, _launcher) = client();
        assert!(!client.is_started());
        assert_eq!(client.connection_id().await, None);

        client.start().await.unwrap();
        assert!(client.is_started());
        assert!(client.connection_id().await.is_some());

        client.stop().await.unwrap();
        assert!(!client.is_started());
        assert_eq!(client.connection_id().await, None);
    }

    #[tokio::test]
    async fn test_restart_replaces_connection() {
        let (client, launcher) = client();
        client.start().await.unwrap();
        let first = client.connection_id().await.unwrap();

        let (count, listener) = counter();
        client.on_restarted(listener);

        client.restart().await.unwrap();
        let second = client.connection_id().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_ne!(first, second);
        assert_eq!(launcher.launch_count(), 2);
        assert!(launcher.connection(0).stopped.load(Ordering::SeqCst));
        assert!(!launcher.connection(1).stopped.load(Ordering::SeqCst));
        assert_eq!(launcher.max_live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operations_require_started() {
        let (client, launcher) = client();
        let doc = TextDocument::lean("file:///a.lean", "example : True := trivial");

        assert!(matches!(client.stop().await, Err(ClientError::NotStarted)));
        assert!(matches!(
            client.refresh_file_dependencies(&doc).await,
            Err(ClientError::NotStarted)
        ));
        assert!(matches!(
            client
                .request_plain_goals("file:///a.lean", Position::new(0, 0))
                .await,
            Err(ClientError::NotStarted)
        ));
        assert!(matches!(
            client.open_document(&doc).await,
            Err(ClientError::NotStarted)
        ));

        assert_eq!(launcher.launch_count(), 0);
        assert!(!client.is_started());

        client.start().await.unwrap();
        client.stop().await.unwrap();
        let err = client.stop().await.unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_refresh_sends_close_then_open() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        let doc = TextDocument::lean("file:///a.lean", "import Mathlib\n");
        client.refresh_file_dependencies(&doc).await.unwrap();

        let sent = launcher.last().sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, methods::DID_CLOSE);
        assert_eq!(
            sent[0].1,
            serde_json::json!({"textDocument": {"uri": "file:///a.lean"}})
        );
        assert_eq!(sent[1].0, methods::DID_OPEN);
        assert_eq!(
            sent[1].1,
            serde_json::json!({"textDocument": {
                "uri": "file:///a.lean",
                "languageId": "lean4",
                "version": 1,
                "text": "import Mathlib\n"
            }})
        );
    }

    #[tokio::test]
    async fn test_refresh_resets_version() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        let doc = TextDocument::lean("file:///a.lean", "v1");
        client.open_document(&doc).await.unwrap();
        client
            .change_document(&doc.clone().with_text("v2"))
            .await
            .unwrap();
        assert_eq!(client.document_version("file:///a.lean"), Some(2));

        client
            .refresh_file_dependencies(&TextDocument::lean("file:///a.lean", "v2"))
            .await
            .unwrap();
        assert_eq!(client.document_version("file:///a.lean"), Some(1));

        assert!(
            client
                .change_document(&TextDocument::lean("file:///a.lean", "v3"))
                .await
                .unwrap()
        );
        let (method, params) = launcher.last().sent().pop().unwrap();
        assert_eq!(method, methods::DID_CHANGE);
        assert_eq!(params["textDocument"]["version"], 2);
        assert_eq!(params["contentChanges"][0]["text"], "v3");
    }

    #[tokio::test]
    async fn test_unchanged_text_sends_nothing() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        let doc = TextDocument::lean("file:///a.lean", "same");
        assert!(client.open_document(&doc).await.unwrap());
        assert!(!client.change_document(&doc).await.unwrap());
        assert_eq!(launcher.last().methods(), vec![methods::DID_OPEN]);
    }

    #[tokio::test]
    async fn test_selector_filters_documents() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        let untitled = TextDocument::lean("untitled:Untitled-1", "#eval 1");
        let markdown = TextDocument::new("file:///README.md", "markdown", "# hi");
        assert!(!client.open_document(&untitled).await.unwrap());
        assert!(!client.open_document(&markdown).await.unwrap());
        assert!(launcher.last().sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_document() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        assert!(!client.close_document("file:///a.lean").await.unwrap());

        client
            .open_document(&TextDocument::lean("file:///a.lean", ""))
            .await
            .unwrap();
        assert!(client.close_document("file:///a.lean").await.unwrap());
        assert_eq!(client.document_version("file:///a.lean"), None);
        assert_eq!(
            launcher.last().methods(),
            vec![methods::DID_OPEN, methods::DID_CLOSE]
        );
    }

    #[tokio::test]
    async fn test_diagnostics_reach_default_path_and_listeners() {
        let (client, launcher) = client();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on_diagnostics(move |event| sink.lock().push(event.clone()));

        client.start().await.unwrap();
        let diagnostics: Vec<Diagnostic> =
            serde_json::from_value(serde_json::json!([{"message": "error X"}])).unwrap();
        launcher
            .last()
            .publish(DiagnosticEvent::new("file:///a.lean", diagnostics.clone()));

        let stored = client.published_diagnostics("file:///a.lean").await.unwrap();
        assert_eq!(stored, diagnostics);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].uri, "file:///a.lean");
        assert_eq!(seen[0].diagnostics, diagnostics);
    }

    #[tokio::test]
    async fn test_removed_listener_is_not_called() {
        let (client, launcher) = client();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let id = client.on_diagnostics(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        client.start().await.unwrap();
        assert!(client.remove_diagnostics_listener(id));
        launcher
            .last()
            .publish(DiagnosticEvent::new("file:///a.lean", Vec::new()));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plain_goal_passthrough() {
        let (client, launcher) = client();
        *launcher.goal.lock() = serde_json::json!({"rendered": "⊢ True"});
        client.start().await.unwrap();

        let goal = client
            .request_plain_goals("file:///a.lean", Position::new(3, 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(goal.rendered, "⊢ True");
        assert_eq!(goal.goals, None);

        let (method, params) = launcher.last().sent().pop().unwrap();
        assert_eq!(method, methods::PLAIN_GOAL);
        assert_eq!(
            params,
            serde_json::json!({
                "textDocument": {"uri": "file:///a.lean"},
                "position": {"line": 3, "character": 5}
            })
        );
    }

    #[tokio::test]
    async fn test_plain_goal_null_is_none() {
        let (client, _launcher) = client();
        client.start().await.unwrap();

        let goal = client
            .request_plain_goals("file:///a.lean", Position::new(0, 0))
            .await
            .unwrap();
        assert_eq!(goal, None);
    }

    #[tokio::test]
    async fn test_server_options() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        let server = launcher.servers.lock()[0].clone();
        assert_eq!(server.command, "lean");
        assert_eq!(server.args, vec!["--server".to_string()]);
        assert_eq!(server.cwd, Some(PathBuf::from("/work/project")));
        assert!(server.env.is_empty());

        let options = &launcher.last().options;
        assert_eq!(options.id, CLIENT_ID);
        assert_eq!(options.name, CLIENT_NAME);
        assert_eq!(
            options.document_selector,
            vec![DocumentFilter::new("file", "lean4")]
        );
    }

    #[tokio::test]
    async fn test_log_dir_only_when_logging_enabled() {
        let mut config = ServerConfig::default();
        config.executable_path = "/opt/lean/bin/lean".to_string();
        config.logging.enabled = true;
        config.logging.path = PathBuf::from("/tmp/lean-logs");

        let (client, launcher) = client_with(config);
        client.start().await.unwrap();

        let server = launcher.servers.lock()[0].clone();
        assert_eq!(server.command, "/opt/lean/bin/lean");
        assert_eq!(
            server.env.get(SERVER_LOG_DIR_ENV).map(String::as_str),
            Some("/tmp/lean-logs")
        );
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_stopped() {
        let (client, launcher) = client();
        launcher.fail_launch.store(true, Ordering::SeqCst);

        let (count, listener) = counter();
        client.on_restarted(listener);

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, ClientError::ServerStart(_)));
        assert!(!client.is_started());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_stop_still_clears_handle() {
        let (client, launcher) = client();
        launcher.fail_stop.store(true, Ordering::SeqCst);
        client.start().await.unwrap();

        let err = client.stop().await.unwrap_err();
        assert!(matches!(err, ClientError::Shutdown(_)));
        assert!(!client.is_started());
        assert_eq!(client.connection_id().await, None);
    }

    #[tokio::test]
    async fn test_failed_stop_aborts_restart() {
        let (client, launcher) = client();
        launcher.fail_stop.store(true, Ordering::SeqCst);
        client.start().await.unwrap();

        let (count, listener) = counter();
        client.on_restarted(listener);

        assert!(client.restart().await.is_err());
        assert_eq!(launcher.launch_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!client.is_started());
    }

    #[tokio::test]
    async fn test_restart_reopens_documents() {
        let (client, launcher) = client();
        client.start().await.unwrap();

        let doc = TextDocument::lean("file:///a.lean", "v1");
        client.open_document(&doc).await.unwrap();
        client
            .change_document(&doc.with_text("v2"))
            .await
            .unwrap();

        client.restart().await.unwrap();

        let sent = launcher.last().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, methods::DID_OPEN);
        assert_eq!(sent[0].1["textDocument"]["version"], 1);
        assert_eq!(sent[0].1["textDocument"]["text"], "v2");
        assert_eq!(client.document_version("file:///a.lean"), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_restarts_keep_one_connection() {
        let launcher = Arc::new(MockLauncher::default());
        let client = Arc::new(LeanClient::new(
            ServerConfig::default(),
            "/work/project",
            launcher.clone(),
        ));
        let (count, listener) = counter();
        client.on_restarted(listener);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.restart().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(client.is_started());
        assert_eq!(launcher.launch_count(), 8);
        assert_eq!(count.load(Ordering::SeqCst), 8);
        assert_eq!(launcher.max_live.load(Ordering::SeqCst), 1);
        assert_eq!(launcher.live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_send_one_did_open() {
        let launcher = Arc::new(MockLauncher::default());
        let client = Arc::new(LeanClient::new(
            ServerConfig::default(),
            "/work/project",
            launcher.clone(),
        ));
        client.start().await.unwrap();

        let doc = TextDocument::lean("file:///a.lean", "theorem t : True := trivial");
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let client = Arc::clone(&client);
                let doc = doc.clone();
                tokio::spawn(async move { client.open_document(&doc).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                opened += 1;
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(launcher.last().methods(), vec![methods::DID_OPEN]);
        assert_eq!(client.document_version("file:///a.lean"), Some(1));
    }
}
