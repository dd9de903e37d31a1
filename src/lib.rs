//! lean-client - Lean 4 language client
//!
//! Manages the lifecycle of a Lean 4 language server connection, forwards
//! its diagnostics to listeners, and exposes the Lean-specific requests
//! (`$/lean/plainGoal`, file dependency refresh) through a typed API.

pub mod app;
pub mod cli;
pub mod client;
pub mod error;
pub mod events;
pub mod infra;
pub mod models;
pub mod services;

pub use client::{ConnectionId, LeanClient, LifecycleState};
pub use error::{ClientError, LeanError, LeanResult};
