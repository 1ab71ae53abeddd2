//! Adapter implementations for node ports.

pub mod memory;
