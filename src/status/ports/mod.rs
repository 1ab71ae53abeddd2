//! Port contracts for the status channel.

mod snapshot;

pub use snapshot::{SnapshotResult, SnapshotSourceError, StatusSnapshotSource};
