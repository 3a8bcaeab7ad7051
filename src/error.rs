use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EzmailError>;

/// Errors surfaced by the sending and reading engines.
///
/// Per-recipient delivery failures and per-part decode failures never show up
/// here: they are recorded in the delivery result or skipped while parsing.
#[derive(Debug, thiserror::Error)]
pub enum EzmailError {
    /// A required configuration field is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied value was rejected before any I/O happened.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A search filter would corrupt the IMAP search expression.
    #[error("invalid search filter: {0}")]
    InvalidFilter(String),

    /// Connecting or authenticating to a server failed.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("not connected to any IMAP server")]
    NotConnected,

    /// SELECT or SEARCH failed; carries the expression for diagnosis.
    #[error("failed to fetch emails with the criteria {criteria}: {message}")]
    Search { criteria: String, message: String },

    #[error("failed to parse message: {0}")]
    Parse(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("secret store error: {0}")]
    Secret(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
