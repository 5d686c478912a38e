//! Error types for connection descriptor validation.

use thiserror::Error;

/// Errors returned while constructing connection domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionDomainError {
    /// The server name is empty after trimming.
    #[error("MCP server name must not be empty")]
    EmptyServerName,

    /// The server name contains characters outside `[a-z0-9_]`.
    #[error(
        "MCP server name '{0}' contains invalid characters (only lowercase alphanumeric and underscores allowed)"
    )]
    InvalidServerName(String),

    /// The server name exceeds the 100-character storage limit.
    #[error("MCP server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// A process-pipe descriptor has no command vector.
    #[error("process-pipe descriptor for '{0}' is missing its command")]
    MissingCommand(String),

    /// An http-stream descriptor has no URL.
    #[error("http-stream descriptor for '{0}' is missing its url")]
    MissingUrl(String),

    /// The URL does not have an `http://` or `https://` prefix.
    #[error("http-stream url '{0}' must start with 'http://' or 'https://'")]
    InvalidUrl(String),
}
