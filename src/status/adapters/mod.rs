//! Adapter implementations for the status channel.

pub mod snapshot;
pub mod websocket;
