//! In-memory catalog adapters.

mod ownership;
mod repository;

pub use ownership::InMemoryOwnershipStore;
pub use repository::InMemoryCatalogRepository;
