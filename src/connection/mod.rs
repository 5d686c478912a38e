//! Connection Manager: live sessions to external MCP tool-servers.
//!
//! Sessions are reached over two transport kinds (process-pipe and
//! streamable HTTP) and registered under unique server names. The registry
//! is shared by the deployment pipeline (throwaway and permanent sessions)
//! and by ordinary tool traffic. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Transport contracts in [`ports`]
//! - Transport implementations in [`adapters`]
//! - Session and registry services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
