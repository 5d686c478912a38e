//! In-memory tool-servers for tests and local runs.

use crate::connection::{
    domain::{JsonRpcError, PROTOCOL_VERSION, ServerName, TransportEndpoint, TransportKind},
    ports::{Transport, TransportError, TransportFactory, TransportResult},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Scripted behaviour of one in-memory tool-server.
#[derive(Debug, Clone, Default)]
pub struct ToolServerBehaviour {
    tools: Vec<Value>,
    page_size: Option<usize>,
    refuse_connection: Option<String>,
    fail_handshake: Option<String>,
    fail_listing: Option<String>,
    process_id: Option<u32>,
}

impl ToolServerBehaviour {
    /// Creates a server exposing the named tools.
    #[must_use]
    pub fn with_tools<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tools = names
            .into_iter()
            .map(|name| {
                let tool_name = name.into();
                json!({
                    "name": tool_name,
                    "description": format!("{tool_name} tool"),
                    "inputSchema": {"type": "object", "properties": {}}
                })
            })
            .collect();
        Self {
            tools,
            ..Self::default()
        }
    }

    /// Serves `tools/list` in pages of `size` entries using `nextCursor`.
    #[must_use]
    pub const fn paged(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Makes opening a transport fail with `message`.
    #[must_use]
    pub fn refusing_connections(mut self, message: impl Into<String>) -> Self {
        self.refuse_connection = Some(message.into());
        self
    }

    /// Makes the `initialize` handshake fail with `message`.
    #[must_use]
    pub fn failing_handshake(mut self, message: impl Into<String>) -> Self {
        self.fail_handshake = Some(message.into());
        self
    }

    /// Makes `tools/list` fail with `message`.
    #[must_use]
    pub fn failing_listing(mut self, message: impl Into<String>) -> Self {
        self.fail_listing = Some(message.into());
        self
    }

    /// Reports `pid` as the process behind each session.
    #[must_use]
    pub const fn backed_by_process(mut self, pid: u32) -> Self {
        self.process_id = Some(pid);
        self
    }
}

#[derive(Debug, Default)]
struct ToolServersState {
    behaviours: HashMap<ServerName, ToolServerBehaviour>,
    fallback: ToolServerBehaviour,
    opened: Vec<ServerName>,
    closed: Vec<ServerName>,
    handshakes: Vec<Value>,
    calls: Vec<(ServerName, String, Value)>,
}

/// Transport factory whose servers live in memory.
///
/// Servers without an explicit behaviour use the fallback, so throwaway
/// session names generated at runtime resolve to something useful.
#[derive(Debug, Clone, Default)]
pub struct InMemoryToolServers {
    state: Arc<RwLock<ToolServersState>>,
}

impl InMemoryToolServers {
    /// Creates a factory whose unnamed servers follow `fallback`.
    #[must_use]
    pub fn new(fallback: ToolServerBehaviour) -> Self {
        Self {
            state: Arc::new(RwLock::new(ToolServersState {
                fallback,
                ..ToolServersState::default()
            })),
        }
    }

    /// Sets the behaviour of the server registered under `name`.
    pub fn set_behaviour(&self, name: ServerName, behaviour: ToolServerBehaviour) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .behaviours
            .insert(name, behaviour);
    }

    /// Replaces the fallback behaviour.
    pub fn set_fallback(&self, behaviour: ToolServerBehaviour) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fallback = behaviour;
    }

    /// Returns the names transports were opened for, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<ServerName> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .opened
            .clone()
    }

    /// Returns the names transports were closed for, in order.
    #[must_use]
    pub fn closed(&self) -> Vec<ServerName> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
            .clone()
    }

    /// Returns the `initialize` params received, in order.
    #[must_use]
    pub fn handshakes(&self) -> Vec<Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handshakes
            .clone()
    }

    /// Returns the `(server, tool, arguments)` calls received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(ServerName, String, Value)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .clone()
    }
}

#[async_trait]
impl TransportFactory for InMemoryToolServers {
    async fn open(
        &self,
        server_name: &ServerName,
        endpoint: &TransportEndpoint,
    ) -> TransportResult<Arc<dyn Transport>> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TransportError::io(std::io::Error::other(err.to_string())))?;
        let behaviour = state
            .behaviours
            .get(server_name)
            .unwrap_or(&state.fallback)
            .clone();

        if let Some(message) = behaviour.refuse_connection.as_ref() {
            return Err(TransportError::io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message.clone(),
            )));
        }

        state.opened.push(server_name.clone());
        Ok(Arc::new(InMemoryTransport {
            server_name: server_name.clone(),
            kind: endpoint.kind(),
            behaviour,
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryTransport {
    server_name: ServerName,
    kind: TransportKind,
    behaviour: ToolServerBehaviour,
    state: Arc<RwLock<ToolServersState>>,
    closed: AtomicBool,
}

impl InMemoryTransport {
    fn record<F>(&self, update: F) -> TransportResult<()>
    where
        F: FnOnce(&mut ToolServersState),
    {
        let mut state = self
            .state
            .write()
            .map_err(|err| TransportError::io(std::io::Error::other(err.to_string())))?;
        update(&mut state);
        Ok(())
    }

    fn initialize(&self, params: Value) -> TransportResult<Value> {
        self.record(|state| state.handshakes.push(params))?;
        if let Some(message) = self.behaviour.fail_handshake.as_ref() {
            return Err(TransportError::Remote(JsonRpcError::new(-32603, message.clone())));
        }
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {"name": self.server_name.as_str(), "version": "0.0.0"}
        }))
    }

    fn list_tools(&self, params: &Value) -> TransportResult<Value> {
        if let Some(message) = self.behaviour.fail_listing.as_ref() {
            return Err(TransportError::Remote(JsonRpcError::new(-32603, message.clone())));
        }
        let total = self.behaviour.tools.len();
        let start = params
            .get("cursor")
            .and_then(Value::as_str)
            .and_then(|cursor| cursor.parse::<usize>().ok())
            .unwrap_or(0)
            .min(total);
        let end = self
            .behaviour
            .page_size
            .map_or(total, |size| start.saturating_add(size.max(1)).min(total));
        let page: Vec<Value> = self
            .behaviour
            .tools
            .iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .cloned()
            .collect();

        if end < total {
            Ok(json!({"tools": page, "nextCursor": end.to_string()}))
        } else {
            Ok(json!({"tools": page}))
        }
    }

    fn call_tool(&self, params: &Value) -> TransportResult<Value> {
        let tool = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let known = self
            .behaviour
            .tools
            .iter()
            .any(|entry| entry.get("name").and_then(Value::as_str) == Some(tool.as_str()));
        if !known {
            return Err(TransportError::Remote(JsonRpcError::new(
                -32602,
                format!("Unknown tool: {tool}"),
            )));
        }

        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        let text = arguments.to_string();
        self.record(|state| {
            state
                .calls
                .push((self.server_name.clone(), tool, arguments));
        })?;
        Ok(json!({"content": [{"type": "text", "text": text}], "isError": false}))
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn process_id(&self) -> Option<u32> {
        self.behaviour.process_id
    }

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        match method {
            "initialize" => self.initialize(params),
            "tools/list" => self.list_tools(&params),
            "tools/call" => self.call_tool(&params),
            other => Err(TransportError::Remote(JsonRpcError::new(
                -32601,
                format!("Method not found: {other}"),
            ))),
        }
    }

    async fn notify(&self, _method: &str, _params: Value) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let name = self.server_name.clone();
        self.record(|state| state.closed.push(name))
    }
}
