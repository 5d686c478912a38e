//! Catalog registration service.

use crate::catalog::{
    domain::{CatalogDomainError, CatalogRecord, OwnerId},
    ports::{CatalogError, CatalogRepository},
};
use crate::connection::domain::{ConnectionDescriptor, ConnectionDomainError, ServerName};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Service-level errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogServiceError {
    /// Catalog value validation failed.
    #[error(transparent)]
    Domain(#[from] CatalogDomainError),
    /// Server name validation failed.
    #[error(transparent)]
    Name(#[from] ConnectionDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] CatalogError),
}

/// Result type for catalog service operations.
pub type CatalogServiceResult<T> = Result<T, CatalogServiceError>;

/// Names tried for one registration before giving up.
const MAX_REGISTRATION_ATTEMPTS: usize = 8;

/// Returns the name tried on `attempt`: the requested name, then the name
/// suffixed with `stamp`, then with `stamp` and a counter.
fn candidate_name(
    requested: &ServerName,
    stamp: &str,
    attempt: usize,
) -> Result<ServerName, ConnectionDomainError> {
    match attempt {
        0 => Ok(requested.clone()),
        1 => requested.with_suffix(stamp),
        n => requested.with_suffix(&format!("{stamp}_{n}")),
    }
}

/// Registers and manages catalog records.
#[derive(Clone)]
pub struct CatalogService<R, C>
where
    R: CatalogRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> CatalogService<R, C>
where
    R: CatalogRepository,
    C: Clock + Send + Sync,
{
    /// Creates a catalog service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Registers `descriptor` for `owner` without overwriting existing records.
    ///
    /// When the descriptor's name is taken, the record is stored under the
    /// name suffixed with the current time in milliseconds, and the stored
    /// descriptor carries the final name. The insert itself decides the
    /// winner of a race: a rejected name moves on to the next candidate,
    /// `<name>_<millis>_2` and so on.
    ///
    /// # Errors
    ///
    /// Returns repository errors, including
    /// [`CatalogError::DuplicateName`] once every candidate is taken.
    pub async fn register_unique(
        &self,
        owner: OwnerId,
        descriptor: &ConnectionDescriptor,
    ) -> CatalogServiceResult<CatalogRecord> {
        let requested = descriptor.name();
        let stamp = self.clock.utc().timestamp_millis().to_string();
        let first = usize::from(self.repository.find_by_name(requested).await?.is_some());
        let last = first + MAX_REGISTRATION_ATTEMPTS - 1;

        let mut attempt = first;
        loop {
            let candidate = candidate_name(requested, &stamp, attempt)?;
            let record = CatalogRecord::new(owner.clone(), descriptor.renamed(candidate), &*self.clock);
            match self.repository.insert(&record).await {
                Ok(()) => {
                    if record.name() != requested {
                        info!(requested = %requested, stored = %record.name(), "catalog name collision resolved with suffix");
                    }
                    return Ok(record);
                }
                Err(CatalogError::DuplicateName(taken)) if attempt < last => {
                    debug!(name = %taken, attempt, "catalog name taken, trying the next suffix");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Lists every record.
    ///
    /// # Errors
    ///
    /// Returns repository errors.
    pub async fn list_all(&self) -> CatalogServiceResult<Vec<CatalogRecord>> {
        Ok(self.repository.list_all().await?)
    }
}
