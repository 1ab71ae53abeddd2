//! In-memory repository for server descriptors.

use crate::server::{
    domain::{ServerDefinition, ServerDescriptor, ServerId, ServerName, ServerStatusUpdate},
    ports::{ServerRepository, ServerRepositoryError, ServerRepositoryResult},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory server repository.
///
/// Identifiers are assigned sequentially starting at 1.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerRepository {
    state: Arc<RwLock<InMemoryServerState>>,
}

#[derive(Debug, Default)]
struct InMemoryServerState {
    last_id: i64,
    servers: BTreeMap<ServerId, ServerDescriptor>,
    name_index: HashMap<ServerName, ServerId>,
}

impl InMemoryServerRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServerRepository for InMemoryServerRepository {
    async fn create(&self, definition: ServerDefinition) -> ServerRepositoryResult<ServerDescriptor> {
        let mut state = self.state.write().map_err(|err| {
            ServerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        if state.name_index.contains_key(&definition.name) {
            return Err(ServerRepositoryError::DuplicateName(definition.name));
        }

        state.last_id += 1;
        let server_id = ServerId::new(state.last_id);
        state.name_index.insert(definition.name.clone(), server_id);
        let descriptor = ServerDescriptor::new(server_id, definition);
        state.servers.insert(server_id, descriptor.clone());
        Ok(descriptor)
    }

    async fn find_by_id(&self, id: ServerId) -> ServerRepositoryResult<Option<ServerDescriptor>> {
        let state = self.state.read().map_err(|err| {
            ServerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.servers.get(&id).cloned())
    }

    async fn list_all(&self) -> ServerRepositoryResult<Vec<ServerDescriptor>> {
        let state = self.state.read().map_err(|err| {
            ServerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.servers.values().cloned().collect())
    }

    async fn update_status(
        &self,
        id: ServerId,
        update: ServerStatusUpdate,
    ) -> ServerRepositoryResult<ServerDescriptor> {
        let mut state = self.state.write().map_err(|err| {
            ServerRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let server = state
            .servers
            .get_mut(&id)
            .ok_or(ServerRepositoryError::NotFound(id))?;
        server.apply(update);
        Ok(server.clone())
    }
}
