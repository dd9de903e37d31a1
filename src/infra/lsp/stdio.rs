//! Process-backed connection speaking JSON-RPC over stdio
//!
//! All outbound traffic (notifications, requests, replies to server
//! requests) goes through one queue drained by a single writer task, so the
//! server sees messages in exactly the order they were queued.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::time::timeout;

use super::connection::{ClientOptions, Connection, Launcher, ServerOptions};
use super::protocol::{
    ClientInfo, InitializeParams, InitializeResult, Message, Notification,
    PublishDiagnosticsParams, Request, RequestId, Response, ResponseError, error_codes, methods,
};
use super::transport::{Transport, encode, write_message};
use crate::error::{ClientError, ClientResult};
use crate::models::diagnostic::{Diagnostic, DiagnosticEvent};
use crate::models::lsp::path_to_uri;

type PendingRequest = oneshot::Sender<Response>;

enum Outbound {
    Message(String),
    Close,
}

/// Launches `StdioConnection`s
pub struct StdioLauncher {
    shutdown_timeout: Duration,
}

impl StdioLauncher {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self { shutdown_timeout }
    }
}

#[async_trait]
impl Launcher for StdioLauncher {
    async fn launch(
        &self,
        server: ServerOptions,
        client: ClientOptions,
    ) -> ClientResult<Arc<dyn Connection>> {
        let connection = StdioConnection::spawn(server, client, self.shutdown_timeout).await?;
        Ok(connection)
    }
}

pub struct StdioConnection {
    options: ClientOptions,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
    next_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    diagnostics: parking_lot::RwLock<HashMap<String, Vec<Diagnostic>>>,
    process: Mutex<Option<Child>>,
    capabilities: RwLock<Option<InitializeResult>>,
    shutting_down: AtomicBool,
    terminated: AtomicBool,
    shutdown_timeout: Duration,
}

impl StdioConnection {
    /// Spawn the server process and complete the initialize handshake
    pub async fn spawn(
        server: ServerOptions,
        client: ClientOptions,
        shutdown_timeout: Duration,
    ) -> ClientResult<Arc<Self>> {
        tracing::info!(
            "Starting {} language server: {} {:?}",
            client.name,
            server.command,
            server.args
        );

        let mut command = Command::new(&server.command);
        command
            .args(&server.args)
            .envs(&server.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &server.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ClientError::ServerStart(format!("{}: {}", server.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::ServerStart("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::ServerStart("Failed to get stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let name = client.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("{} stderr: {}", name, line);
                }
            });
        }

        let connection = Self::connect(stdout, stdin, client, shutdown_timeout);
        *connection.process.lock().await = Some(child);

        let root = match &server.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        if let Err(e) = connection.initialize(Some(path_to_uri(&root))).await {
            connection.kill().await;
            return Err(ClientError::ServerStart(format!(
                "{} initialize failed: {}",
                server.command, e
            )));
        }

        tracing::info!("{} language server started", connection.options.name);
        Ok(connection)
    }

    /// Wrap an already-connected byte stream pair. Spawns the reader and
    /// writer tasks; call `initialize` before sending document traffic.
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        options: ClientOptions,
        shutdown_timeout: Duration,
    ) -> Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            options,
            outbound: tx,
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            diagnostics: parking_lot::RwLock::new(HashMap::new()),
            process: Mutex::new(None),
            capabilities: RwLock::new(None),
            shutting_down: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            shutdown_timeout,
        });

        tokio::spawn(write_loop(writer, rx));

        let reader_side = Arc::clone(&connection);
        tokio::spawn(async move {
            reader_side.read_messages(Transport::new(reader)).await;
        });

        connection
    }

    /// Initialize the language server
    pub async fn initialize(&self, root_uri: Option<String>) -> ClientResult<()> {
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri,
            capabilities: Self::client_capabilities(),
            client_info: Some(ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        };

        let result = self
            .request(methods::INITIALIZE, serde_json::to_value(params)?)
            .await?;
        let result: InitializeResult =
            serde_json::from_value(result).map_err(|e| ClientError::Protocol(e.to_string()))?;

        if let Some(info) = &result.server_info {
            tracing::debug!(
                "{} server: {} {}",
                self.options.name,
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }
        *self.capabilities.write().await = Some(result);

        self.notify(methods::INITIALIZED, serde_json::json!({}))
    }

    fn client_capabilities() -> Value {
        serde_json::json!({
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "didSave": false
                },
                "publishDiagnostics": {
                    "relatedInformation": true,
                    "versionSupport": true,
                    "tagSupport": { "valueSet": [1, 2] }
                }
            },
            "window": {
                "workDoneProgress": false,
                "showDocument": { "support": false }
            },
            "workspace": {
                "configuration": true,
                "workspaceFolders": false
            }
        })
    }

    pub async fn capabilities(&self) -> Option<InitializeResult> {
        self.capabilities.read().await.clone()
    }

    /// Send a notification (no response expected)
    pub fn notify(&self, method: &str, params: Value) -> ClientResult<()> {
        let notification = Notification::new(method, Some(params));
        self.enqueue(encode(&notification)?)
    }

    /// Send a request and wait for the response
    pub async fn request(&self, method: &str, params: Value) -> ClientResult<Value> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(ClientError::ServerTerminated);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(RequestId::Number(id), tx);

        let request = Request::new(id, method, Some(params));
        tracing::trace!("{} request {}: {}", self.options.name, id, method);

        if let Err(e) = encode(&request)
            .map_err(ClientError::from)
            .and_then(|json| self.enqueue(json))
        {
            self.pending.lock().await.remove(&RequestId::Number(id));
            return Err(e);
        }

        match rx.await {
            Ok(response) => match response.into_result() {
                Ok(result) => Ok(result),
                Err(err) if err.code == error_codes::SERVER_TERMINATED => {
                    Err(ClientError::ServerTerminated)
                }
                Err(err) => Err(err.into()),
            },
            Err(_) => Err(ClientError::ServerTerminated),
        }
    }

    fn enqueue(&self, json: String) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::NotConnected);
        }
        self.outbound
            .send(Outbound::Message(json))
            .map_err(|_| ClientError::NotConnected)
    }

    fn close_outbound(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.outbound.send(Outbound::Close);
        }
    }

    /// Background task that reads and dispatches server messages
    async fn read_messages<R: AsyncRead + Unpin>(self: Arc<Self>, mut transport: Transport<R>) {
        loop {
            match transport.read_message().await {
                Ok(message) => self.handle_message(message).await,
                Err(e) => {
                    if !self.shutting_down.load(Ordering::Acquire) {
                        tracing::error!("{} read error: {}", self.options.name, e);
                    }
                    break;
                }
            }
        }
        self.terminated.store(true, Ordering::Release);
        self.close_outbound();
        self.cancel_pending(
            error_codes::SERVER_TERMINATED,
            &format!("{} language server terminated", self.options.name),
        )
        .await;
    }

    async fn cancel_pending(&self, code: i32, reason: &str) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            tracing::debug!("Cancelling {} pending requests: {}", pending.len(), reason);
        }
        for (id, sender) in pending.drain() {
            let _ = sender.send(Response::failure(id, ResponseError::new(code, reason)));
        }
    }

    async fn handle_message(&self, message: Message) {
        match message {
            Message::Response(response) => self.handle_response(response).await,
            Message::Request(request) => self.handle_server_request(request),
            Message::Notification(notification) => self.handle_notification(notification).await,
        }
    }

    async fn handle_response(&self, response: Response) {
        let Some(id) = response.id.clone() else {
            tracing::debug!("Response without id: {:?}", response.error);
            return;
        };

        let mut pending = self.pending.lock().await;
        // Some servers echo numeric ids back as strings
        let sender = pending.remove(&id).or_else(|| match &id {
            RequestId::String(s) => s
                .parse::<u64>()
                .ok()
                .and_then(|n| pending.remove(&RequestId::Number(n))),
            RequestId::Number(_) => None,
        });

        match sender {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!("Received response for unknown request ID {:?}", id),
        }
    }

    async fn handle_notification(&self, notification: Notification) {
        let params = notification.params.unwrap_or(Value::Null);

        match notification.method.as_str() {
            methods::PUBLISH_DIAGNOSTICS => {
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(published) => {
                        let event = DiagnosticEvent::new(published.uri, published.diagnostics);
                        // Listeners fired by the middleware after `next` see the new list
                        self.options
                            .deliver_diagnostics(event, |e| self.store_diagnostics(e));
                    }
                    Err(e) => tracing::warn!("Malformed publishDiagnostics: {}", e),
                }
            }
            methods::LOG_MESSAGE | methods::SHOW_MESSAGE => {
                if let Some(msg) = params.get("message").and_then(|m| m.as_str()) {
                    // LSP MessageType: 1=Error, 2=Warning, 3=Info, 4=Log
                    match params.get("type").and_then(|t| t.as_u64()) {
                        Some(1) => tracing::error!("{}: {}", self.options.name, msg),
                        Some(2) => tracing::warn!("{}: {}", self.options.name, msg),
                        Some(3) => tracing::info!("{}: {}", self.options.name, msg),
                        _ => tracing::debug!("{}: {}", self.options.name, msg),
                    }
                }
            }
            method => tracing::trace!("Unhandled notification: {}", method),
        }
    }

    /// Default diagnostics path: keep the latest list per document.
    /// Every published document keeps its entry until the connection goes away.
    fn store_diagnostics(&self, event: DiagnosticEvent) {
        tracing::debug!(
            "Cached {} diagnostics for {}",
            event.diagnostics.len(),
            event.uri
        );
        self.diagnostics
            .write()
            .insert(event.uri, event.diagnostics);
    }

    /// Latest diagnostics stored for `uri`
    pub fn latest_diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        self.diagnostics.read().get(uri).cloned().unwrap_or_default()
    }

    fn handle_server_request(&self, request: Request) {
        let result = match request.method.as_str() {
            "workspace/configuration" => Ok(Self::workspace_configuration(&request.params)),
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create" => Ok(Value::Null),
            _ => {
                tracing::debug!("Unhandled server request: {}", request.method);
                Err(ResponseError::new(
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                ))
            }
        };

        let response = match result {
            Ok(value) => Response::success(request.id, value),
            Err(error) => Response::failure(request.id, error),
        };

        if let Err(e) = encode(&response)
            .map_err(ClientError::from)
            .and_then(|json| self.enqueue(json))
        {
            tracing::debug!("Dropping reply to {}: {}", request.method, e);
        }
    }

    /// One empty settings object per requested item
    fn workspace_configuration(params: &Option<Value>) -> Value {
        let items = params
            .as_ref()
            .and_then(|p| p.get("items"))
            .and_then(|i| i.as_array())
            .map(|arr| arr.len())
            .unwrap_or(0);

        Value::Array(vec![Value::Object(serde_json::Map::new()); items])
    }

    /// Shutdown handshake, then wait for the process, force-killing it if
    /// it outlives the grace period
    pub async fn shutdown(&self) -> ClientResult<()> {
        self.shutting_down.store(true, Ordering::Release);
        let mut failure: Option<String> = None;

        if !self.terminated.load(Ordering::Acquire) {
            match timeout(
                self.shutdown_timeout,
                self.request(methods::SHUTDOWN, Value::Null),
            )
            .await
            {
                Ok(Ok(_)) => {
                    let _ = self.notify(methods::EXIT, Value::Null);
                }
                Ok(Err(e)) => failure = Some(format!("shutdown request failed: {}", e)),
                Err(_) => failure = Some("shutdown request timed out".to_string()),
            }
        }

        // Closing the queue drops the writer, which closes the server's stdin
        self.close_outbound();

        if let Some(mut child) = self.process.lock().await.take() {
            match timeout(self.shutdown_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!("{} language server exited: {:?}", self.options.name, status);
                }
                Ok(Err(e)) => {
                    tracing::warn!("{} language server wait error: {}", self.options.name, e);
                    failure.get_or_insert_with(|| format!("wait failed: {}", e));
                }
                Err(_) => {
                    tracing::warn!(
                        "{} language server did not exit, forcing kill",
                        self.options.name
                    );
                    let _ = child.kill().await;
                    failure.get_or_insert_with(|| {
                        format!("process did not exit within {:?}", self.shutdown_timeout)
                    });
                }
            }
        }

        self.cancel_pending(error_codes::REQUEST_CANCELLED, "Server shutdown")
            .await;
        tracing::info!("{} language server stopped", self.options.name);

        match failure {
            Some(message) => Err(ClientError::Shutdown(message)),
            None => Ok(()),
        }
    }

    async fn kill(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.close_outbound();
        if let Some(mut child) = self.process.lock().await.take() {
            let _ = child.kill().await;
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Connection for StdioConnection {
    fn send_notification(&self, method: &str, params: Value) -> ClientResult<()> {
        self.notify(method, params)
    }

    async fn send_request(&self, method: &str, params: Value) -> ClientResult<Value> {
        self.request(method, params).await
    }

    async fn diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        self.latest_diagnostics(uri)
    }

    async fn stop(&self) -> ClientResult<()> {
        self.shutdown().await
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Message(json) => {
                if let Err(e) = write_message(&mut writer, &json).await {
                    tracing::warn!("LSP write failed: {}", e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}
