//! In-memory catalog repository.

use crate::catalog::{
    domain::{CatalogRecord, CatalogServerId},
    ports::{CatalogError, CatalogRepository, CatalogResult},
};
use crate::connection::domain::ServerName;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogRepository {
    state: Arc<RwLock<CatalogState>>,
}

#[derive(Debug, Default)]
struct CatalogState {
    records: HashMap<CatalogServerId, CatalogRecord>,
    name_index: HashMap<ServerName, CatalogServerId>,
}

impl InMemoryCatalogRepository {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> CatalogError {
    CatalogError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn insert(&self, record: &CatalogRecord) -> CatalogResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;

        if state.records.contains_key(&record.id()) {
            return Err(CatalogError::DuplicateId(record.id()));
        }
        if state.name_index.contains_key(record.name()) {
            return Err(CatalogError::DuplicateName(record.name().clone()));
        }

        state.name_index.insert(record.name().clone(), record.id());
        state.records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: CatalogServerId) -> CatalogResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let record = state.records.remove(&id).ok_or(CatalogError::NotFound(id))?;
        state.name_index.remove(record.name());
        Ok(())
    }

    async fn find_by_id(&self, id: CatalogServerId) -> CatalogResult<Option<CatalogRecord>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.records.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &ServerName) -> CatalogResult<Option<CatalogRecord>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .name_index
            .get(name)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn list_all(&self) -> CatalogResult<Vec<CatalogRecord>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut records: Vec<CatalogRecord> = state.records.values().cloned().collect();
        records.sort_by(|left, right| left.name().cmp(right.name()));
        Ok(records)
    }
}
