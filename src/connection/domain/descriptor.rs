//! Connection descriptors and the transport endpoints they resolve to.

use super::{ConnectionDomainError, ServerName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Transport used to reach a tool-server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Line-delimited JSON-RPC over a child process's stdin/stdout.
    ProcessPipe,
    /// MCP streamable HTTP (JSON or server-sent events responses).
    HttpStream,
}

impl TransportKind {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessPipe => "process-pipe",
            Self::HttpStream => "http-stream",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Declarative description of how to reach a tool-server.
///
/// The required field for the declared kind is checked when the descriptor
/// is resolved with [`ConnectionDescriptor::endpoint`], so descriptors read
/// from storage or the wire can be carried around before they are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    name: ServerName,
    transport_kind: TransportKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
}

impl ConnectionDescriptor {
    /// Creates a process-pipe descriptor from a command vector.
    #[must_use]
    pub fn process_pipe(name: ServerName, command: impl IntoIterator<Item = String>) -> Self {
        Self {
            name,
            transport_kind: TransportKind::ProcessPipe,
            command: command.into_iter().collect(),
            url: None,
            env: BTreeMap::new(),
        }
    }

    /// Creates an http-stream descriptor.
    #[must_use]
    pub fn http_stream(name: ServerName, url: impl Into<String>) -> Self {
        Self {
            name,
            transport_kind: TransportKind::HttpStream,
            command: Vec::new(),
            url: Some(url.into()),
            env: BTreeMap::new(),
        }
    }

    /// Returns a copy registered under another name.
    #[must_use]
    pub fn renamed(&self, name: ServerName) -> Self {
        Self {
            name,
            ..self.clone()
        }
    }

    /// Returns the server name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns the declared transport kind.
    #[must_use]
    pub const fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    /// Returns the command vector (empty for http-stream descriptors).
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Returns the URL, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Resolves the endpoint for the declared transport kind.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionDomainError::MissingCommand`] or
    /// [`ConnectionDomainError::MissingUrl`] when the field required by the
    /// declared kind is absent, and [`ConnectionDomainError::InvalidUrl`] for a
    /// URL without an HTTP scheme.
    pub fn endpoint(&self) -> Result<TransportEndpoint, ConnectionDomainError> {
        match self.transport_kind {
            TransportKind::ProcessPipe => {
                let Some((program, args)) = self.command.split_first() else {
                    return Err(ConnectionDomainError::MissingCommand(
                        self.name.as_str().to_owned(),
                    ));
                };
                if program.trim().is_empty() {
                    return Err(ConnectionDomainError::MissingCommand(
                        self.name.as_str().to_owned(),
                    ));
                }
                Ok(TransportEndpoint::ProcessPipe(ProcessPipeEndpoint {
                    program: program.clone(),
                    args: args.to_vec(),
                    env: self.env.clone(),
                }))
            }
            TransportKind::HttpStream => {
                let url = self
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| ConnectionDomainError::MissingUrl(self.name.as_str().to_owned()))?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConnectionDomainError::InvalidUrl(url.to_owned()));
                }
                Ok(TransportEndpoint::HttpStream(HttpStreamEndpoint {
                    url: url.to_owned(),
                }))
            }
        }
    }
}

/// Resolved process-pipe endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPipeEndpoint {
    /// Executable to spawn.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

/// Resolved http-stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStreamEndpoint {
    /// MCP endpoint URL.
    pub url: String,
}

/// Endpoint resolved from a [`ConnectionDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEndpoint {
    /// Spawn a child process and speak JSON-RPC over its pipes.
    ProcessPipe(ProcessPipeEndpoint),
    /// POST JSON-RPC messages to an HTTP endpoint.
    HttpStream(HttpStreamEndpoint),
}

impl TransportEndpoint {
    /// Returns the transport kind of this endpoint.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::ProcessPipe(_) => TransportKind::ProcessPipe,
            Self::HttpStream(_) => TransportKind::HttpStream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name() -> ServerName {
        ServerName::new("weather").expect("valid name")
    }

    #[test]
    fn process_pipe_without_command_is_rejected() {
        let descriptor = ConnectionDescriptor::process_pipe(name(), Vec::new());
        assert_eq!(
            descriptor.endpoint(),
            Err(ConnectionDomainError::MissingCommand("weather".to_owned()))
        );
    }

    #[test]
    fn http_stream_without_url_is_rejected() {
        let descriptor: ConnectionDescriptor =
            serde_json::from_value(json!({"name": "weather", "transportKind": "http-stream"}))
                .expect("descriptor should deserialize");
        assert_eq!(
            descriptor.endpoint(),
            Err(ConnectionDomainError::MissingUrl("weather".to_owned()))
        );
    }

    #[test]
    fn process_pipe_splits_program_and_args() {
        let descriptor = ConnectionDescriptor::process_pipe(
            name(),
            vec!["python3".to_owned(), "server.py".to_owned()],
        );
        let endpoint = descriptor.endpoint().expect("endpoint should resolve");
        let TransportEndpoint::ProcessPipe(pipe) = endpoint else {
            panic!("expected a process-pipe endpoint");
        };
        assert_eq!(pipe.program, "python3");
        assert_eq!(pipe.args, vec!["server.py".to_owned()]);
    }

    #[test]
    fn descriptor_wire_shape_uses_camel_case() {
        let descriptor = ConnectionDescriptor::http_stream(name(), "http://localhost:8080/mcp");
        let value = serde_json::to_value(&descriptor).expect("descriptor should serialize");
        assert_eq!(
            value,
            json!({
                "name": "weather",
                "transportKind": "http-stream",
                "url": "http://localhost:8080/mcp"
            })
        );
    }
}
