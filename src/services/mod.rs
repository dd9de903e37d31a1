//! Service layer for lean-client

pub mod config;

pub use config::{ConfigService, DefaultConfigService};
