//! Session handling and the connection registry.

mod manager;
mod session;

pub use manager::{ConnectionManager, ConnectionServiceError, ConnectionServiceResult};
pub use session::ClientSession;
