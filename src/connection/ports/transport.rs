//! Transport port for JSON-RPC exchanges with a tool-server.

use crate::connection::domain::{JsonRpcError, ServerName, TransportEndpoint, TransportKind};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Bidirectional JSON-RPC channel to one tool-server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the transport kind.
    fn kind(&self) -> TransportKind;

    /// Returns the id of the server process this transport owns, if any.
    fn process_id(&self) -> Option<u32> {
        None
    }

    /// Sends a request and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Remote`] with the server's error object
    /// unchanged when the server answers with a JSON-RPC error.
    async fn request(&self, method: &str, params: Value) -> TransportResult<Value>;

    /// Sends a notification that expects no response.
    async fn notify(&self, method: &str, params: Value) -> TransportResult<()>;

    /// Closes the channel and releases the underlying resources.
    async fn close(&self) -> TransportResult<()>;
}

/// Opens transports for resolved endpoints.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Opens a transport to `endpoint` for the server called `server_name`.
    async fn open(
        &self,
        server_name: &ServerName,
        endpoint: &TransportEndpoint,
    ) -> TransportResult<Arc<dyn Transport>>;
}

/// Errors returned by transport adapters.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server process could not be spawned.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// The server answered with a JSON-RPC error.
    #[error("{0}")]
    Remote(JsonRpcError),

    /// The HTTP endpoint answered with a non-success status.
    #[error("MCP endpoint returned HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// No response arrived within the request timeout.
    #[error("MCP request '{method}' timed out")]
    Timeout {
        /// Method of the request that timed out.
        method: String,
    },

    /// The channel was closed before a response arrived.
    #[error("MCP transport closed")]
    Closed,

    /// The server sent something that is not valid MCP.
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// Lower-level I/O or HTTP client failure.
    #[error("MCP transport error: {0}")]
    Io(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps a spawn failure for `program`.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source: Arc::new(source),
        }
    }

    /// Wraps a lower-level I/O or client failure.
    pub fn io(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Io(Arc::new(err))
    }
}
