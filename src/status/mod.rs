//! Real-time server status channel.
//!
//! Subscribers connect over WebSocket, receive the full status list on
//! connect, and then every transition as it is persisted. The
//! [`services::ConnectionHub`] enforces a connection ceiling and evicts
//! subscribers that stop sending heartbeats.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
