//! Shared error and result types

use thiserror::Error;

/// Errors surfaced by adjuster services
#[derive(Error, Debug)]
pub enum AdjusterError {
    /// Transport or ledger-reported failure; the message is surfaced
    /// verbatim to HTTP callers
    #[error("{0}")]
    Ledger(String),

    /// Invalid configuration detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed inbound request (body, path, or query)
    #[error("{0}")]
    Http(String),

    /// Lookup target does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AdjusterError>;
