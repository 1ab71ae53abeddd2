//! Snapshot source backed by the server repository.

use crate::server::{domain::ServerStatusEvent, ports::ServerRepository};
use crate::status::ports::{SnapshotResult, SnapshotSourceError, StatusSnapshotSource};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads every server's status from a [`ServerRepository`].
#[derive(Debug)]
pub struct RepositorySnapshotSource<R> {
    servers: Arc<R>,
}

impl<R> RepositorySnapshotSource<R> {
    /// Wraps a server repository.
    #[must_use]
    pub const fn new(servers: Arc<R>) -> Self {
        Self { servers }
    }
}

#[async_trait]
impl<R> StatusSnapshotSource for RepositorySnapshotSource<R>
where
    R: ServerRepository,
{
    async fn current_statuses(&self) -> SnapshotResult<Vec<ServerStatusEvent>> {
        let servers = self
            .servers
            .list_all()
            .await
            .map_err(SnapshotSourceError::new)?;
        Ok(servers.iter().map(ServerStatusEvent::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::adapters::memory::InMemoryServerRepository;
    use crate::server::domain::{Port, ServerDefinition, ServerName, ServerStatus};

    #[tokio::test]
    async fn statuses_follow_identifier_order() {
        let servers = Arc::new(InMemoryServerRepository::new());
        for (name, port) in [("North", 4850), ("South", 4851)] {
            servers
                .create(ServerDefinition::new(
                    ServerName::new(name).expect("valid server name"),
                    Port::new(port).expect("valid port"),
                ))
                .await
                .expect("server should be stored");
        }
        let source = RepositorySnapshotSource::new(servers);

        let statuses = source
            .current_statuses()
            .await
            .expect("snapshot should build");

        let ids: Vec<i64> = statuses.iter().map(|event| event.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(statuses
            .iter()
            .all(|event| event.status == ServerStatus::Stopped));
    }
}
