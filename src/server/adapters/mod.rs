//! Adapter implementations for server persistence, protocol hosting, and
//! the HTTP control surface.

pub mod http;
pub mod memory;
pub mod runtime;
