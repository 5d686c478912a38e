//! Slipway: deploys generated MCP tool-servers and manages live sessions.
//!
//! This crate turns a declarative resource descriptor into a running,
//! connected tool-server. Deployment is a saga-style pipeline with
//! compensating rollback, and a shared connection manager multiplexes
//! sessions to many tool-servers for both the pipeline and ordinary tool
//! traffic.
//!
//! # Architecture
//!
//! Slipway follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (processes, HTTP,
//!   database, filesystem)
//!
//! # Modules
//!
//! - [`deployment`]: Deployment pipeline, rollback and error classification
//! - [`connection`]: MCP transports and the session registry
//! - [`catalog`]: Persistent registry of deployed servers and ownership
//! - [`process`]: Command execution, startup probing and process tracking
//! - [`config`]: Deployment settings

pub mod catalog;
pub mod config;
pub mod connection;
pub mod deployment;
pub mod process;
