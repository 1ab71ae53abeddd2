//! Port contracts for node persistence.

mod repository;

pub use repository::{NodeRepository, NodeRepositoryError, NodeRepositoryResult};
