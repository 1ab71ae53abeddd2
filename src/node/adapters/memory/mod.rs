//! In-memory adapters for node persistence.

mod repository;

pub use repository::InMemoryNodeRepository;
