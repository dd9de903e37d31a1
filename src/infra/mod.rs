//! Infrastructure layer for lean-client
//!
//! Contains the language server plumbing.

pub mod lsp;
