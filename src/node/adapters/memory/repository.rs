//! In-memory repository for node descriptors.

use crate::node::{
    domain::{NodeDefinition, NodeDescriptor, NodeId},
    ports::{NodeRepository, NodeRepositoryError, NodeRepositoryResult},
};
use crate::server::domain::ServerId;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory node repository.
///
/// Identifiers are assigned sequentially starting at 1.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNodeRepository {
    state: Arc<RwLock<InMemoryNodeState>>,
}

#[derive(Debug, Default)]
struct InMemoryNodeState {
    last_id: i64,
    nodes: BTreeMap<NodeId, NodeDescriptor>,
    address_index: HashMap<String, NodeId>,
}

impl InMemoryNodeRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn create(&self, definition: NodeDefinition) -> NodeRepositoryResult<NodeDescriptor> {
        let mut state = self.state.write().map_err(|err| {
            NodeRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        let address = definition.address().as_str().to_owned();
        if state.address_index.contains_key(&address) {
            return Err(NodeRepositoryError::DuplicateAddress(address));
        }

        state.last_id += 1;
        let node_id = NodeId::new(state.last_id);
        let descriptor = NodeDescriptor::new(node_id, definition);
        state.address_index.insert(address, node_id);
        state.nodes.insert(node_id, descriptor.clone());
        Ok(descriptor)
    }

    async fn find_by_id(&self, node_id: NodeId) -> NodeRepositoryResult<Option<NodeDescriptor>> {
        let state = self.state.read().map_err(|err| {
            NodeRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.nodes.get(&node_id).cloned())
    }

    async fn find_by_server(
        &self,
        server_id: ServerId,
    ) -> NodeRepositoryResult<Vec<NodeDescriptor>> {
        let state = self.state.read().map_err(|err| {
            NodeRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state
            .nodes
            .values()
            .filter(|node| node.definition().is_on_server(server_id))
            .cloned()
            .collect())
    }

    async fn update_value(
        &self,
        node_id: NodeId,
        value: String,
    ) -> NodeRepositoryResult<NodeDescriptor> {
        let mut state = self.state.write().map_err(|err| {
            NodeRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let node = state
            .nodes
            .get_mut(&node_id)
            .ok_or(NodeRepositoryError::NotFound(node_id))?;
        node.set_value(value);
        Ok(node.clone())
    }
}
