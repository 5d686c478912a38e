//! Transport adapters.

mod factory;
mod memory;
mod stdio;
mod streamable_http;

pub use factory::{DEFAULT_REQUEST_TIMEOUT, DefaultTransportFactory};
pub use memory::{InMemoryToolServers, ToolServerBehaviour};
pub use stdio::StdioTransport;
pub use streamable_http::{StreamableHttpTransport, parse_sse_messages};
