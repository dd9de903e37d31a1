//! Error types for lean-client

use thiserror::Error;

pub type LeanResult<T> = std::result::Result<T, LeanError>;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum LeanError {
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Language server is not started")]
    NotStarted,

    #[error("Failed to start server: {0}")]
    ServerStart(String),

    #[error("Server not connected")]
    NotConnected,

    #[error("Language server terminated unexpectedly")]
    ServerTerminated,

    #[error("Server error [{code}]: {message}")]
    ServerError { code: i32, message: String },

    #[error("Failed to stop server: {0}")]
    Shutdown(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn error_code(&self) -> i32 {
        use crate::infra::lsp::protocol::error_codes;

        match self {
            Self::ServerError { code, .. } => *code,
            Self::ServerTerminated => error_codes::SERVER_TERMINATED,
            Self::NotStarted | Self::NotConnected => error_codes::SERVER_NOT_INITIALIZED,
            _ => -32000,
        }
    }

    /// Whether the caller violated the "must be started" contract
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// Whether the failure came from the connection rather than the caller
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ServerStart(_)
                | Self::NotConnected
                | Self::ServerTerminated
                | Self::ServerError { .. }
                | Self::Protocol(_)
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}

impl From<crate::infra::lsp::protocol::ResponseError> for ClientError {
    fn from(err: crate::infra::lsp::protocol::ResponseError) -> Self {
        ClientError::ServerError {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
