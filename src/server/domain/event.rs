//! Status transition events published to subscribers.

use super::{ServerDescriptor, ServerId, ServerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One server's status as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatusEvent {
    /// Server identifier.
    pub id: ServerId,
    /// Status after the transition.
    pub status: ServerStatus,
    /// Timestamp of the latest start attempt.
    pub last_started: Option<DateTime<Utc>>,
}

impl From<&ServerDescriptor> for ServerStatusEvent {
    fn from(server: &ServerDescriptor) -> Self {
        Self {
            id: server.id(),
            status: server.status(),
            last_started: server.last_started(),
        }
    }
}
