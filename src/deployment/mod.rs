//! Deployment Orchestrator: from resource descriptor to live tool-server.
//!
//! A saga of seven sequential steps (environment, materialize, install,
//! startup probe, protocol validation, catalog registration, activation)
//! with reverse-order compensation when a step after the first fails.
//! Progress is streamed as [`domain::DeploymentMessage`] values. The module
//! follows hexagonal architecture:
//!
//! - Domain types and the error classifier in [`domain`]
//! - Source generator contract in [`ports`]
//! - Template generator and output workspace in [`adapters`]
//! - Orchestrator, environment checks and rollback in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
