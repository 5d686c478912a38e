//! Catalog services.

mod registry;

pub use registry::{CatalogService, CatalogServiceError, CatalogServiceResult};
