//! Repository port for node persistence.

use crate::node::domain::{NodeDefinition, NodeDescriptor, NodeId};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for node repository operations.
pub type NodeRepositoryResult<T> = Result<T, NodeRepositoryError>;

/// Persistence contract for node descriptors.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Stores a new node and assigns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`NodeRepositoryError::DuplicateAddress`] when another node
    /// already uses the same protocol address.
    async fn create(&self, definition: NodeDefinition) -> NodeRepositoryResult<NodeDescriptor>;

    /// Finds a node by identifier.
    async fn find_by_id(&self, node_id: NodeId) -> NodeRepositoryResult<Option<NodeDescriptor>>;

    /// Returns the nodes linked to a server, ordered by identifier.
    async fn find_by_server(
        &self,
        server_id: ServerId,
    ) -> NodeRepositoryResult<Vec<NodeDescriptor>>;

    /// Replaces a node's stored value.
    ///
    /// # Errors
    ///
    /// Returns [`NodeRepositoryError::NotFound`] when the node does not exist.
    async fn update_value(
        &self,
        node_id: NodeId,
        value: String,
    ) -> NodeRepositoryResult<NodeDescriptor>;
}

/// Errors returned by node repository implementations.
#[derive(Debug, Clone, Error)]
pub enum NodeRepositoryError {
    /// Another node already uses the protocol address.
    #[error("node address already exists: {0}")]
    DuplicateAddress(String),

    /// The node was not found.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl NodeRepositoryError {
    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
