//! `PostgreSQL` catalog adapter.

mod models;
mod repository;
mod schema;

pub use repository::{CATALOG_SCHEMA_SQL, CatalogPgPool, PostgresCatalogRepository};
