//! `PostgreSQL` catalog repository.

use super::{
    models::{CatalogServerRow, NewCatalogServerRow},
    schema::catalog_servers,
};
use crate::catalog::{
    domain::{CatalogRecord, CatalogServerId, OwnerId, PersistedCatalogData},
    ports::{CatalogError, CatalogRepository, CatalogResult},
};
use crate::connection::domain::{ConnectionDescriptor, ServerName};
use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type for the catalog.
pub type CatalogPgPool = Pool<ConnectionManager<PgConnection>>;

/// Name of the unique index on `catalog_servers.name`.
const NAME_INDEX: &str = "idx_catalog_servers_name";

/// DDL creating the catalog table when it does not exist.
pub const CATALOG_SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS catalog_servers (
    id UUID PRIMARY KEY,
    owner VARCHAR(255) NOT NULL,
    name VARCHAR(100) NOT NULL,
    transport JSONB NOT NULL,
    enabled BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_catalog_servers_name ON catalog_servers (name);
";

/// `PostgreSQL`-backed catalog repository.
#[derive(Debug, Clone)]
pub struct PostgresCatalogRepository {
    pool: CatalogPgPool,
}

impl PostgresCatalogRepository {
    /// Creates a repository from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: CatalogPgPool) -> Self {
        Self { pool }
    }

    /// Creates the catalog table and its name index when missing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Persistence`] when the DDL fails.
    pub async fn ensure_schema(&self) -> CatalogResult<()> {
        self.run_blocking(|connection| {
            connection
                .batch_execute(CATALOG_SCHEMA_SQL)
                .map_err(CatalogError::persistence)
        })
        .await
    }

    async fn run_blocking<F, T>(&self, operation: F) -> CatalogResult<T>
    where
        F: FnOnce(&mut PgConnection) -> CatalogResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(CatalogError::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(CatalogError::persistence)?
    }
}

#[async_trait]
impl CatalogRepository for PostgresCatalogRepository {
    async fn insert(&self, record: &CatalogRecord) -> CatalogResult<()> {
        let record_id = record.id();
        let record_name = record.name().clone();
        let new_row = to_new_row(record)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(catalog_servers::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_name_unique_violation(info.as_ref()) =>
                    {
                        CatalogError::DuplicateName(record_name.clone())
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        CatalogError::DuplicateId(record_id)
                    }
                    _ => CatalogError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: CatalogServerId) -> CatalogResult<()> {
        self.run_blocking(move |connection| {
            let deleted =
                diesel::delete(catalog_servers::table.filter(catalog_servers::id.eq(id.into_inner())))
                    .execute(connection)
                    .map_err(CatalogError::persistence)?;
            if deleted == 0 {
                return Err(CatalogError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: CatalogServerId) -> CatalogResult<Option<CatalogRecord>> {
        self.run_blocking(move |connection| {
            let row = catalog_servers::table
                .filter(catalog_servers::id.eq(id.into_inner()))
                .select(CatalogServerRow::as_select())
                .first::<CatalogServerRow>(connection)
                .optional()
                .map_err(CatalogError::persistence)?;
            row.map(row_to_record).transpose()
        })
        .await
    }

    async fn find_by_name(&self, name: &ServerName) -> CatalogResult<Option<CatalogRecord>> {
        let wanted = name.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = catalog_servers::table
                .filter(catalog_servers::name.eq(&wanted))
                .select(CatalogServerRow::as_select())
                .first::<CatalogServerRow>(connection)
                .optional()
                .map_err(CatalogError::persistence)?;
            row.map(row_to_record).transpose()
        })
        .await
    }

    async fn list_all(&self) -> CatalogResult<Vec<CatalogRecord>> {
        self.run_blocking(move |connection| {
            let rows = catalog_servers::table
                .order(catalog_servers::name.asc())
                .select(CatalogServerRow::as_select())
                .load::<CatalogServerRow>(connection)
                .map_err(CatalogError::persistence)?;
            rows.into_iter().map(row_to_record).collect()
        })
        .await
    }
}

fn to_new_row(record: &CatalogRecord) -> CatalogResult<NewCatalogServerRow> {
    let transport =
        serde_json::to_value(record.transport()).map_err(CatalogError::persistence)?;
    Ok(NewCatalogServerRow {
        id: record.id().into_inner(),
        owner: record.owner().as_str().to_owned(),
        name: record.name().as_str().to_owned(),
        transport,
        enabled: record.enabled(),
        created_at: record.created_at(),
    })
}

fn row_to_record(row: CatalogServerRow) -> CatalogResult<CatalogRecord> {
    let CatalogServerRow {
        id,
        owner,
        name,
        transport,
        enabled,
        created_at,
    } = row;

    let parsed_name = ServerName::new(name).map_err(CatalogError::invalid_persisted_data)?;
    let parsed_owner = OwnerId::new(owner).map_err(CatalogError::invalid_persisted_data)?;
    let parsed_transport: ConnectionDescriptor =
        serde_json::from_value(transport).map_err(CatalogError::invalid_persisted_data)?;

    Ok(CatalogRecord::from_persisted(PersistedCatalogData {
        id: CatalogServerId::from_uuid(id),
        owner: parsed_owner,
        name: parsed_name,
        transport: parsed_transport,
        enabled,
        created_at,
    }))
}

fn is_name_unique_violation(info: &dyn diesel::result::DatabaseErrorInformation) -> bool {
    info.constraint_name().is_some_and(|name| name == NAME_INDEX)
}
