//! In-memory ownership store.

use crate::catalog::{
    domain::OwnerId,
    ports::{OwnershipError, OwnershipResult, OwnershipStore},
};
use crate::connection::domain::ServerName;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory owner to server links.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOwnershipStore {
    links: Arc<RwLock<BTreeMap<OwnerId, BTreeSet<ServerName>>>>,
}

impl InMemoryOwnershipStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> OwnershipError {
    OwnershipError::storage(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl OwnershipStore for InMemoryOwnershipStore {
    async fn link(&self, owner: &OwnerId, server: &ServerName) -> OwnershipResult<()> {
        self.links
            .write()
            .map_err(lock_error)?
            .entry(owner.clone())
            .or_default()
            .insert(server.clone());
        Ok(())
    }

    async fn servers_for(&self, owner: &OwnerId) -> OwnershipResult<Vec<ServerName>> {
        let links = self.links.read().map_err(lock_error)?;
        Ok(links
            .get(owner)
            .map(|servers| servers.iter().cloned().collect())
            .unwrap_or_default())
    }
}
