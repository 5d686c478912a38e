//! Port contracts for the deployment pipeline.
//!
//! Persistence, ownership and process ports live with their own bounded
//! contexts; only source generation is specific to deployment.

mod generator;

pub use generator::{GenerationRequest, GeneratorError, GeneratorResult, SourceGenerator};
