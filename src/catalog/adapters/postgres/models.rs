//! Diesel row models for catalog persistence.

use super::schema::catalog_servers;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for catalog records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = catalog_servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CatalogServerRow {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Requesting user.
    pub owner: String,
    /// Unique server name.
    pub name: String,
    /// Serialized connection descriptor.
    pub transport: Value,
    /// Enabled flag.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for catalog records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = catalog_servers)]
pub struct NewCatalogServerRow {
    /// Record identifier.
    pub id: uuid::Uuid,
    /// Requesting user.
    pub owner: String,
    /// Unique server name.
    pub name: String,
    /// Serialized connection descriptor.
    pub transport: Value,
    /// Enabled flag.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
