//! Application services for the status channel.

mod hub;

pub use hub::{ConnectionHub, Subscription};
