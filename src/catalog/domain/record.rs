//! Catalog record aggregate.

use super::{CatalogServerId, OwnerId};
use crate::connection::domain::{ConnectionDescriptor, ServerName};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A tool-server registered in the persistent catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    id: CatalogServerId,
    owner: OwnerId,
    name: ServerName,
    transport: ConnectionDescriptor,
    enabled: bool,
    created_at: DateTime<Utc>,
}

/// Raw persisted values used to rebuild a [`CatalogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCatalogData {
    /// Persisted identifier.
    pub id: CatalogServerId,
    /// Persisted owner.
    pub owner: OwnerId,
    /// Persisted unique name.
    pub name: ServerName,
    /// Persisted connection descriptor.
    pub transport: ConnectionDescriptor,
    /// Persisted enabled flag.
    pub enabled: bool,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// Creates an enabled record named after `transport`.
    #[must_use]
    pub fn new(owner: OwnerId, transport: ConnectionDescriptor, clock: &impl Clock) -> Self {
        Self {
            id: CatalogServerId::new(),
            owner,
            name: transport.name().clone(),
            transport,
            enabled: true,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs a record from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedCatalogData) -> Self {
        Self {
            id: data.id,
            owner: data.owner,
            name: data.name,
            transport: data.transport,
            enabled: data.enabled,
            created_at: data.created_at,
        }
    }

    /// Enables or disables the record.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn id(&self) -> CatalogServerId {
        self.id
    }

    /// Returns the owner.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Returns the unique name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns the connection descriptor.
    #[must_use]
    pub const fn transport(&self) -> &ConnectionDescriptor {
        &self.transport
    }

    /// Returns whether the record is enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockable::DefaultClock;

    #[test]
    fn new_records_are_enabled_and_named_after_transport() {
        let name = ServerName::new("weather").expect("valid name");
        let descriptor =
            ConnectionDescriptor::process_pipe(name.clone(), vec!["python3".to_owned()]);
        let owner = OwnerId::new("alice").expect("valid owner");

        let record = CatalogRecord::new(owner, descriptor, &DefaultClock);

        assert!(record.enabled());
        assert_eq!(record.name(), &name);
    }

    #[test]
    fn persisted_data_round_trips_through_constructor() {
        let name = ServerName::new("weather").expect("valid name");
        let data = PersistedCatalogData {
            id: CatalogServerId::new(),
            owner: OwnerId::new("bob").expect("valid owner"),
            name: name.clone(),
            transport: ConnectionDescriptor::http_stream(name, "http://127.0.0.1:9000/mcp"),
            enabled: false,
            created_at: Utc
                .with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
                .single()
                .expect("valid timestamp"),
        };

        let record = CatalogRecord::from_persisted(data.clone());

        assert_eq!(record.id(), data.id);
        assert!(!record.enabled());
        assert_eq!(record.created_at(), data.created_at);
    }
}
