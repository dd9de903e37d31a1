//! LSP infrastructure for lean-client
//!
//! - JSON-RPC 2.0 protocol types
//! - Content-Length framing over any async stream
//! - `Connection` / `Launcher` seam used by `LeanClient`
//! - Process-backed stdio connection

pub mod connection;
pub mod protocol;
pub mod stdio;
pub mod transport;

pub use connection::{
    ClientOptions, Connection, DiagnosticsMiddleware, DocumentFilter, Launcher, ServerOptions,
};
pub use stdio::{StdioConnection, StdioLauncher};
