//! Outbound port for server status transitions.

use crate::server::domain::ServerStatusEvent;
use async_trait::async_trait;

/// Receives every persisted status transition.
///
/// Delivery is best-effort; implementations never fail the caller.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// Publishes one transition.
    async fn publish(&self, event: &ServerStatusEvent);
}
