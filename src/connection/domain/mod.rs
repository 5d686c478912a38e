//! Domain model for tool-server connections.
//!
//! Connection descriptors, validated server names, tool descriptors and the
//! JSON-RPC message shapes shared by all transports. Infrastructure concerns
//! (processes, sockets) stay in the adapters.

mod descriptor;
mod error;
mod ids;
mod jsonrpc;
mod tool;

pub use descriptor::{
    ConnectionDescriptor, HttpStreamEndpoint, ProcessPipeEndpoint, TransportEndpoint,
    TransportKind,
};
pub use error::ConnectionDomainError;
pub use ids::{MAX_SERVER_NAME_LENGTH, ServerName};
pub use jsonrpc::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
};
pub use tool::ToolDescriptor;
