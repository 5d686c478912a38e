//! Per-user ownership store port.

use crate::catalog::domain::OwnerId;
use crate::connection::domain::ServerName;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for ownership operations.
pub type OwnershipResult<T> = Result<T, OwnershipError>;

/// Links deployed servers to the users who requested them.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Records that `owner` owns `server`. Linking twice is a no-op.
    async fn link(&self, owner: &OwnerId, server: &ServerName) -> OwnershipResult<()>;

    /// Returns the servers owned by `owner`, sorted by name.
    async fn servers_for(&self, owner: &OwnerId) -> OwnershipResult<Vec<ServerName>>;
}

/// Errors returned by ownership store implementations.
#[derive(Debug, Clone, Error)]
pub enum OwnershipError {
    /// Storage-layer failure.
    #[error("ownership store error: {0}")]
    Storage(Arc<dyn std::error::Error + Send + Sync>),
}

impl OwnershipError {
    /// Wraps a storage-layer failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Arc::new(err))
    }
}
