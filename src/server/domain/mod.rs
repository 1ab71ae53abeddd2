//! Domain model for protocol servers.
//!
//! The server domain models server identity, the listening port, and the
//! lifecycle status machine with its endpoint and uptime bookkeeping.
//! Runtime handles and persistence remain outside this boundary.

mod error;
mod event;
mod ids;
mod server;

pub use error::{ParseServerStatusError, ServerDomainError};
pub use event::ServerStatusEvent;
pub use ids::{MIN_SERVER_PORT, Port, ServerId, ServerName};
pub use server::{
    PersistedServerData, ServerDefinition, ServerDescriptor, ServerStatus, ServerStatusUpdate,
    endpoint_for, namespace_uri_for,
};
