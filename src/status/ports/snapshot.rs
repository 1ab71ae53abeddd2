//! Port for the full status list sent to new subscribers.

use crate::server::domain::ServerStatusEvent;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for snapshot source operations.
pub type SnapshotResult<T> = Result<T, SnapshotSourceError>;

/// Source of every server's current status.
#[async_trait]
pub trait StatusSnapshotSource: Send + Sync {
    /// Returns every server's status ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotSourceError`] when the backing store fails.
    async fn current_statuses(&self) -> SnapshotResult<Vec<ServerStatusEvent>>;
}

/// Failure of the backing store behind a snapshot source.
#[derive(Debug, Clone, Error)]
#[error("snapshot source error: {0}")]
pub struct SnapshotSourceError(Arc<dyn std::error::Error + Send + Sync>);

impl SnapshotSourceError {
    /// Wraps a backing store failure.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}
