//! Process-wide registry of live tool-server sessions.

use super::ClientSession;
use crate::connection::{
    domain::{ConnectionDescriptor, ConnectionDomainError, ServerName, ToolDescriptor, TransportKind},
    ports::{Transport, TransportError, TransportFactory},
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Service-level errors for connection management.
#[derive(Debug, Error)]
pub enum ConnectionServiceError {
    /// The descriptor failed validation.
    #[error(transparent)]
    Domain(#[from] ConnectionDomainError),
    /// The transport failed or the server answered with an error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// No session is registered under the name.
    #[error("MCP server '{0}' is not connected")]
    NotConnected(ServerName),
    /// A session is already registered under the name.
    #[error("MCP server '{0}' is already connected")]
    AlreadyConnected(ServerName),
}

/// Result type for connection manager operations.
pub type ConnectionServiceResult<T> = Result<T, ConnectionServiceError>;

#[derive(Default)]
struct Registry {
    sessions: BTreeMap<ServerName, Arc<ClientSession>>,
    transports: BTreeMap<ServerName, (TransportKind, Arc<dyn Transport>)>,
}

/// Multiplexes sessions to many independently addressable tool-servers.
///
/// One instance is shared by the deployment pipeline and ordinary request
/// traffic. Names are unique keys: a second `connect` under a registered name
/// is rejected instead of replacing the live session.
pub struct ConnectionManager {
    factory: Arc<dyn TransportFactory>,
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ConnectionManager")
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates an empty manager that opens transports through `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Opens a session described by `descriptor` and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionServiceError::Domain`] when the descriptor lacks
    /// the field its transport kind requires,
    /// [`ConnectionServiceError::AlreadyConnected`] for a duplicate name, and
    /// transport errors from spawning or the handshake.
    pub async fn connect(&self, descriptor: &ConnectionDescriptor) -> ConnectionServiceResult<()> {
        let endpoint = descriptor.endpoint()?;
        let name = descriptor.name().clone();
        if self.is_connected(&name).await {
            return Err(ConnectionServiceError::AlreadyConnected(name));
        }

        let transport = self.factory.open(&name, &endpoint).await?;
        let session = match ClientSession::initialize(name.clone(), Arc::clone(&transport)).await {
            Ok(session) => session,
            Err(err) => {
                if let Err(close_err) = transport.close().await {
                    debug!(server = %name, error = %close_err, "closing transport after failed handshake");
                }
                return Err(err.into());
            }
        };

        let mut registry = self.registry.write().await;
        if registry.sessions.contains_key(&name) {
            drop(registry);
            if let Err(close_err) = transport.close().await {
                debug!(server = %name, error = %close_err, "closing duplicate transport");
            }
            return Err(ConnectionServiceError::AlreadyConnected(name));
        }
        registry
            .sessions
            .insert(name.clone(), Arc::new(session));
        registry
            .transports
            .insert(name.clone(), (endpoint.kind(), transport));
        info!(server = %name, transport = %endpoint.kind(), "MCP server connected");
        Ok(())
    }

    /// Closes and removes the session registered under `name`.
    ///
    /// Missing entries are ignored. Both registry entries are removed before
    /// the transport is closed, so a close failure never leaves a stale entry.
    ///
    /// # Errors
    ///
    /// Returns the transport error raised while closing.
    pub async fn disconnect(&self, name: &ServerName) -> ConnectionServiceResult<()> {
        let (session, transport) = {
            let mut registry = self.registry.write().await;
            (
                registry.sessions.remove(name),
                registry.transports.remove(name),
            )
        };

        match (session, transport) {
            (_, Some((_, transport))) => {
                transport.close().await?;
                info!(server = %name, "MCP server disconnected");
            }
            (Some(session), None) => {
                session.close().await?;
                info!(server = %name, "MCP server disconnected");
            }
            (None, None) => debug!(server = %name, "disconnect requested for unknown server"),
        }
        Ok(())
    }

    /// Lists the tools of every connected server.
    ///
    /// Servers are queried concurrently; a server whose listing fails is
    /// logged and skipped.
    pub async fn list_all_tools(&self) -> Vec<ToolDescriptor> {
        let sessions: Vec<Arc<ClientSession>> =
            self.registry.read().await.sessions.values().cloned().collect();

        let listings = join_all(sessions.iter().map(|session| async move {
            (session.server_name(), session.list_tools().await)
        }))
        .await;

        listings
            .into_iter()
            .flat_map(|(server, listing)| match listing {
                Ok(tools) => tools,
                Err(err) => {
                    warn!(server = %server, error = %err, "skipping server whose tool listing failed");
                    Vec::new()
                }
            })
            .collect()
    }

    /// Lists the tools of one connected server.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionServiceError::NotConnected`] for an unknown name,
    /// or transport errors from the listing.
    pub async fn list_tools(&self, name: &ServerName) -> ConnectionServiceResult<Vec<ToolDescriptor>> {
        let session = self.session(name).await?;
        Ok(session.list_tools().await?)
    }

    /// Invokes `tool` on the server registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionServiceError::NotConnected`] naming the server
    /// when it is not registered; remote errors are surfaced unmodified.
    pub async fn call_tool(
        &self,
        name: &ServerName,
        tool: &str,
        arguments: Value,
    ) -> ConnectionServiceResult<Value> {
        let session = self.session(name).await?;
        Ok(session.call_tool(tool, arguments).await?)
    }

    /// Returns whether a session is registered under `name`.
    pub async fn is_connected(&self, name: &ServerName) -> bool {
        self.registry.read().await.sessions.contains_key(name)
    }

    /// Returns the names of every registered session, sorted.
    pub async fn list_connected_servers(&self) -> Vec<ServerName> {
        self.registry.read().await.sessions.keys().cloned().collect()
    }

    /// Returns the transport kind of the session registered under `name`.
    pub async fn transport_kind(&self, name: &ServerName) -> Option<TransportKind> {
        self.registry
            .read()
            .await
            .transports
            .get(name)
            .map(|(kind, _)| *kind)
    }

    /// Returns the id of the process behind the session under `name`.
    pub async fn process_id(&self, name: &ServerName) -> Option<u32> {
        self.registry
            .read()
            .await
            .transports
            .get(name)
            .and_then(|(_, transport)| transport.process_id())
    }

    async fn session(&self, name: &ServerName) -> ConnectionServiceResult<Arc<ClientSession>> {
        self.registry
            .read()
            .await
            .sessions
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectionServiceError::NotConnected(name.clone()))
    }
}
