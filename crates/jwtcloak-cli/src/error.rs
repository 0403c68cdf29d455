//! Error types for CLI operations

use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// The token was rejected; carries the diagnostic cause
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid command input
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Get user-friendly suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Unauthorized(_) => vec![
                "Check that the token's iss claim matches a configured issuer exactly",
                "Run with -v to see which verification stage rejected the token",
            ],
            Self::InvalidArguments(_) => vec!["Use --help to see expected arguments"],
            _ => vec![],
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
