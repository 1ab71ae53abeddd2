//! In-memory integration tests.
//!
//! Tests are organized into modules by functionality:
//! - `node_value_tests`: Node creation, batch expansion, triggers, generators
//! - `server_lifecycle_tests`: Start and stop flows, provisioning, sweeps

mod in_memory {
    pub mod helpers;

    mod node_value_tests;
    mod server_lifecycle_tests;
}
