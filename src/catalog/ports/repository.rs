//! Repository port for catalog persistence.

use crate::catalog::domain::{CatalogRecord, CatalogServerId};
use crate::connection::domain::ServerName;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for catalog repository operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Persistence contract for catalog records.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateId`] or [`CatalogError::DuplicateName`]
    /// when the record collides with an existing one.
    async fn insert(&self, record: &CatalogRecord) -> CatalogResult<()>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when no record has the identifier.
    async fn delete(&self, id: CatalogServerId) -> CatalogResult<()>;

    /// Finds a record by identifier.
    async fn find_by_id(&self, id: CatalogServerId) -> CatalogResult<Option<CatalogRecord>>;

    /// Finds a record by unique name.
    async fn find_by_name(&self, name: &ServerName) -> CatalogResult<Option<CatalogRecord>>;

    /// Returns every record.
    async fn list_all(&self) -> CatalogResult<Vec<CatalogRecord>>;
}

/// Errors returned by catalog repository implementations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// A record with the same identifier already exists.
    #[error("duplicate catalog identifier: {0}")]
    DuplicateId(CatalogServerId),

    /// A record with the same name already exists.
    #[error("duplicate catalog server name: {0}")]
    DuplicateName(ServerName),

    /// No record has the identifier.
    #[error("catalog record {0} does not exist")]
    NotFound(CatalogServerId),

    /// Persisted data could not be rebuilt into domain types.
    #[error("invalid persisted catalog data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
