//! OPC UA fleet manager.
//!
//! Defines simulated protocol servers and the variable nodes they publish,
//! drives server lifecycles, and fans status changes out to WebSocket
//! subscribers.
//!
//! # Architecture
//!
//! Each bounded context follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory stores,
//!   the simulated protocol host, HTTP and WebSocket surfaces)
//!
//! # Modules
//!
//! - [`node`]: Node definitions, value coercion, expressions, and value
//!   generators
//! - [`server`]: Server definitions, runtime registry, and lifecycle
//!   orchestration
//! - [`status`]: Real-time status fan-out to subscribers

pub mod node;
pub mod server;
pub mod status;
