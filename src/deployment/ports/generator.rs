//! Source generator port.

use crate::connection::domain::ServerName;
use crate::deployment::domain::{
    GeneratedSource, LanguageVariant, PackagingFormat, ResourceDescriptor,
};
use std::sync::Arc;
use thiserror::Error;

/// Result type for source generation.
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Everything a generator needs to render one server.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Tools and metadata to expose.
    pub descriptor: &'a ResourceDescriptor,
    /// Name the server advertises.
    pub server_name: &'a ServerName,
    /// Packaging format.
    pub format: PackagingFormat,
    /// Output language.
    pub language: LanguageVariant,
}

/// Renders tool-server source code from a resource descriptor.
pub trait SourceGenerator: Send + Sync {
    /// Generates the server source for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError`] when the descriptor cannot be rendered.
    fn generate(&self, request: &GenerationRequest<'_>) -> GeneratorResult<GeneratedSource>;
}

/// Errors returned by source generators.
#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    /// Template rendering failed.
    #[error("source template error: {0}")]
    Template(Arc<dyn std::error::Error + Send + Sync>),

    /// The descriptor holds something the generator cannot express.
    #[error("invalid resource descriptor for generation: {0}")]
    InvalidDescriptor(String),
}

impl GeneratorError {
    /// Wraps a template engine failure.
    pub fn template(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Template(Arc::new(err))
    }
}
