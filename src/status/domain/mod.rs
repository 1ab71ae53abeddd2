//! Domain model for the status channel.
//!
//! Subscriber identity, hub settings, the JSON wire messages, and the
//! frames queued per connection.

mod config;
mod error;
mod ids;
mod message;

pub use config::HubConfig;
pub use error::HubError;
pub use ids::ConnectionId;
pub use message::{
    CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, CLOSE_POLICY_VIOLATION, ClientCommand, HubFrame, PONG,
    StatusMessage,
};
