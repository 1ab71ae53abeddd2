//! Repository port for server descriptor persistence.

use crate::server::domain::{
    ServerDefinition, ServerDescriptor, ServerId, ServerName, ServerStatusUpdate,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for server repository operations.
pub type ServerRepositoryResult<T> = Result<T, ServerRepositoryError>;

/// Persistence contract for server descriptors.
#[async_trait]
pub trait ServerRepository: Send + Sync {
    /// Stores a new, stopped server and assigns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRepositoryError::DuplicateName`] when the name is
    /// already registered.
    async fn create(&self, definition: ServerDefinition) -> ServerRepositoryResult<ServerDescriptor>;

    /// Finds a server by identifier.
    async fn find_by_id(&self, id: ServerId) -> ServerRepositoryResult<Option<ServerDescriptor>>;

    /// Returns all servers ordered by identifier.
    async fn list_all(&self) -> ServerRepositoryResult<Vec<ServerDescriptor>>;

    /// Writes the status columns of an existing server.
    ///
    /// # Errors
    ///
    /// Returns [`ServerRepositoryError::NotFound`] when the server does not
    /// exist.
    async fn update_status(
        &self,
        id: ServerId,
        update: ServerStatusUpdate,
    ) -> ServerRepositoryResult<ServerDescriptor>;
}

/// Errors returned by server repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ServerRepositoryError {
    /// A server with the same name already exists.
    #[error("duplicate server name: {0}")]
    DuplicateName(ServerName),

    /// The server was not found.
    #[error("server not found: {0}")]
    NotFound(ServerId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ServerRepositoryError {
    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
