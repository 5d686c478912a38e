//! Catalog domain types.

mod error;
mod ids;
mod record;

pub use error::CatalogDomainError;
pub use ids::{CatalogServerId, OwnerId};
pub use record::{CatalogRecord, PersistedCatalogData};
