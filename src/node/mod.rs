//! Typed protocol nodes and their value generators.
//!
//! This module covers the data points a protocol server exposes: string
//! coercion against a closed set of scalar types, validated node
//! definitions, the sandboxed change-expression evaluator, and the engine
//! that computes the next value of linear, discrete, random, and
//! conditional generators. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - The change-expression evaluator in [`expression`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Value computation and update services in [`services`]

pub mod adapters;
pub mod domain;
pub mod expression;
pub mod ports;
pub mod services;
