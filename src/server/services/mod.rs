//! Application services for server lifecycle management.

mod lifecycle;
mod provision;
mod registry;

pub use lifecycle::{
    LifecycleError, LifecycleOrchestrator, LifecycleResult, ShutdownSummary, StartOutcome,
    StopOutcome,
};
pub use provision::ProvisionWarning;
pub use registry::{RuntimeServerHandle, ServerRegistry, StopClaim};
