//! MCP client session layered over a transport.

use crate::connection::{
    domain::{PROTOCOL_VERSION, ServerName, ToolDescriptor, TransportKind},
    ports::{Transport, TransportError, TransportResult},
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

/// Client name announced in the `initialize` handshake.
const CLIENT_NAME: &str = "slipway";

/// Upper bound on `tools/list` pages followed for one server.
const MAX_TOOL_PAGES: usize = 64;

/// Initialized MCP session bound to one server.
pub struct ClientSession {
    server_name: ServerName,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientSession")
            .field("server_name", &self.server_name)
            .field("kind", &self.transport.kind())
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Performs the MCP handshake over `transport`.
    ///
    /// The client advertises tool-calling, resource-reading and prompt-listing
    /// capabilities, then confirms with `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the `initialize` exchange.
    pub async fn initialize(
        server_name: ServerName,
        transport: Arc<dyn Transport>,
    ) -> TransportResult<Self> {
        let result = transport
            .request("initialize", handshake_params())
            .await?;
        if !result.is_object() {
            return Err(TransportError::Protocol(format!(
                "initialize result from '{server_name}' is not an object"
            )));
        }
        transport
            .notify("notifications/initialized", Value::Null)
            .await?;

        let server_info = result.get("serverInfo").cloned().unwrap_or(Value::Null);
        debug!(server = %server_name, %server_info, "MCP handshake complete");
        Ok(Self {
            server_name,
            transport,
        })
    }

    /// Returns the server name this session is registered under.
    #[must_use]
    pub const fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    /// Returns the transport kind.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Lists every tool the server exposes, following pagination cursors.
    ///
    /// # Errors
    ///
    /// Returns transport errors, or [`TransportError::Protocol`] when a tool
    /// entry has no name.
    pub async fn list_tools(&self) -> TransportResult<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor
                .as_ref()
                .map_or_else(|| json!({}), |next| json!({ "cursor": next }));
            let page = self.transport.request("tools/list", params).await?;

            let entries = page
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    TransportError::Protocol(format!(
                        "tools/list result from '{}' has no tools array",
                        self.server_name
                    ))
                })?;
            for entry in entries {
                tools.push(self.parse_tool(entry)?);
            }

            cursor = page
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(str::to_owned);
            if cursor.is_none() {
                break;
            }
        }

        Ok(tools)
    }

    /// Invokes a tool and returns the raw `tools/call` result.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Remote`] with the server's error untouched
    /// when the call fails remotely.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> TransportResult<Value> {
        let normalized = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        self.transport
            .request(
                "tools/call",
                json!({ "name": tool_name, "arguments": normalized }),
            )
            .await
    }

    /// Closes the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns transport errors raised while closing.
    pub async fn close(&self) -> TransportResult<()> {
        self.transport.close().await
    }

    fn parse_tool(&self, entry: &Value) -> TransportResult<ToolDescriptor> {
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                TransportError::Protocol(format!(
                    "tool entry from '{}' has no name",
                    self.server_name
                ))
            })?;

        let mut tool = ToolDescriptor::new(name, self.server_name.clone());
        if let Some(description) = entry.get("description").and_then(Value::as_str) {
            tool = tool.with_description(description);
        }
        if let Some(schema) = entry.get("inputSchema") {
            tool = tool.with_input_schema(schema.clone());
        }
        Ok(tool)
    }
}

fn handshake_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {}
        },
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}
