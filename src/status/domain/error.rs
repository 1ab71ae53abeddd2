//! Error types for the connection hub.

use super::{CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, CLOSE_POLICY_VIOLATION, ConnectionId};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by connection hub operations.
#[derive(Debug, Clone, Error)]
pub enum HubError {
    /// The connection ceiling is reached.
    #[error("connection limit of {limit} reached")]
    AdmissionRejected {
        /// Configured ceiling.
        limit: usize,
    },

    /// The connection was closed or evicted.
    #[error("connection {0} is not active")]
    UnknownConnection(ConnectionId),

    /// The status snapshot could not be built.
    #[error("status snapshot unavailable: {0}")]
    Snapshot(Arc<dyn std::error::Error + Send + Sync>),
}

impl HubError {
    /// Wraps a snapshot source failure.
    pub fn snapshot(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Snapshot(Arc::new(err))
    }

    /// WebSocket close code reported to the client for this error.
    #[must_use]
    pub const fn close_code(&self) -> u16 {
        match self {
            Self::AdmissionRejected { .. } => CLOSE_POLICY_VIOLATION,
            Self::UnknownConnection(_) => CLOSE_GOING_AWAY,
            Self::Snapshot(_) => CLOSE_INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(HubError::AdmissionRejected { limit: 2 }, 1008)]
    #[case(HubError::UnknownConnection(ConnectionId::new()), 1001)]
    #[case(HubError::snapshot(std::io::Error::other("offline")), 1011)]
    fn close_codes_follow_error_kind(#[case] err: HubError, #[case] expected: u16) {
        assert_eq!(err.close_code(), expected);
    }
}
