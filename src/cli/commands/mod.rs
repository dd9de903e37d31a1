//! Command implementations for lean-client
//!
//! Each command is implemented in its own module. The helpers below start a
//! client for one command and wait for the server's diagnostics.

pub mod config;
pub mod diagnostics;
pub mod goal;
pub mod refresh;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::app::App;
use crate::client::LeanClient;
use crate::models::diagnostic::DiagnosticEvent;

/// Started client plus a feed of its diagnostics events
pub(crate) struct Session {
    pub client: LeanClient,
    events: mpsc::UnboundedReceiver<DiagnosticEvent>,
}

impl Session {
    pub async fn start(app: &App) -> Result<Self> {
        let client = app.client();
        let (tx, events) = mpsc::unbounded_channel();
        client.on_diagnostics(move |event| {
            let _ = tx.send(event.clone());
        });

        client.start().await?;
        Ok(Self { client, events })
    }

    /// Wait up to `wait` for diagnostics on `uri`. Lean publishes several
    /// rounds while elaborating, so keep draining until the deadline.
    pub async fn wait_for_diagnostics(&mut self, uri: &str, wait: Duration) -> usize {
        let deadline = Instant::now() + wait;
        let mut rounds = 0;

        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            if event.uri == uri {
                rounds += 1;
                tracing::debug!(
                    "Diagnostics round {} for {}: {} entries",
                    rounds,
                    uri,
                    event.diagnostics.len()
                );
            }
        }
        rounds
    }

    /// Stop the server; a failed shutdown only gets logged
    pub async fn finish(self) {
        if let Err(e) = self.client.stop().await {
            tracing::warn!("{}", e);
        }
    }
}
