//! Protocol server fleet: descriptors, runtime registry, and lifecycle.
//!
//! A server is started by claiming its identifier in the
//! [`services::ServerRegistry`], provisioning its nodes onto a fresh
//! protocol instance, and installing the live handle. Every persisted status
//! transition is pushed to a [`ports::StatusPublisher`].

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
