//! Error types for server domain validation and parsing.

use super::{Port, ServerId};
use thiserror::Error;

/// Errors returned while constructing or transitioning server values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServerDomainError {
    /// The server name is empty after trimming.
    #[error("server name must not be empty")]
    EmptyServerName,

    /// The server name exceeds the 100-character storage limit.
    #[error("server name exceeds 100 character limit: {0}")]
    ServerNameTooLong(String),

    /// The port lies in the privileged range.
    #[error("port {0} is outside 1024..=65535")]
    InvalidPort(u16),

    /// Another running server already listens on the port.
    #[error("port {port} is already in use by running server {owner}")]
    PortInUse {
        /// Requested port.
        port: Port,
        /// Server currently bound to the port.
        owner: ServerId,
    },

    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid server status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: String,
        /// Requested target status.
        to: String,
    },
}

/// Error returned while parsing a server status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown server status: {0}")]
pub struct ParseServerStatusError(pub String);
