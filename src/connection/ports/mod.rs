//! Port contracts for tool-server transports.

mod transport;

pub use transport::{Transport, TransportError, TransportFactory, TransportResult};
