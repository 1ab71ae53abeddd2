//! In-memory persistence adapters for server descriptors.

mod repository;

pub use repository::InMemoryServerRepository;
