//! Port contracts for the catalog.

mod ownership;
mod repository;

pub use ownership::{OwnershipError, OwnershipResult, OwnershipStore};
pub use repository::{CatalogError, CatalogRepository, CatalogResult};
