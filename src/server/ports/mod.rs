//! Port contracts for server lifecycle orchestration.

mod protocol;
mod publisher;
mod repository;

pub use protocol::{ProtocolError, ProtocolHost, ProtocolResult, ProtocolServer, VariableSpec};
pub use publisher::StatusPublisher;
pub use repository::{ServerRepository, ServerRepositoryError, ServerRepositoryResult};
