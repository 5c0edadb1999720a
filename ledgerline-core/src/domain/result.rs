//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// The sync pipeline distinguishes three failure scopes: fatal-to-run
/// (`Provider`, `Database`), ownership/lookup failures surfaced to the
/// caller (`NotFound`, `Forbidden`), and everything else. Account-scoped
/// and transaction-scoped problems never become an `Error`; they are
/// recorded as skips on the sync summary instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Provider error ({provider}): {message}")]
    Provider {
        provider: String,
        /// HTTP status when the provider answered with one
        status: Option<u16>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a provider error with optional HTTP status
    pub fn provider(provider: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            status,
            message: msg.into(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
