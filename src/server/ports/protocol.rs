//! Protocol host port: builds and runs protocol server instances.
//!
//! The binary wire protocol lives behind this boundary. An instance is
//! configured (name, namespace, variables) before [`ProtocolServer::start`]
//! binds it, and is released by [`ProtocolServer::stop`].

use crate::node::domain::{NodeAddress, TypedValue};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for protocol host operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Variable to expose on a protocol server.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// Namespace index returned by [`ProtocolServer::register_namespace`].
    pub namespace_index: u16,
    /// Node address the variable is published under.
    pub address: NodeAddress,
    /// Browse name.
    pub browse_name: String,
    /// Initial value.
    pub value: TypedValue,
    /// Whether clients may write the value.
    pub writable: bool,
    /// Optional human-readable description.
    pub description: Option<String>,
}

/// A configurable protocol server instance.
#[async_trait]
pub trait ProtocolServer: Send + Sync {
    /// Sets the application name advertised to clients.
    fn set_server_name(&mut self, name: &str);

    /// Registers a namespace URI and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Runtime`] when the instance refuses the URI.
    fn register_namespace(&mut self, uri: &str) -> ProtocolResult<u16>;

    /// Adds a variable to the address space.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidVariable`] when the variable cannot be
    /// created.
    fn add_variable(&mut self, variable: VariableSpec) -> ProtocolResult<()>;

    /// Binds the endpoint and begins serving.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::AddressInUse`] when the endpoint is taken and
    /// [`ProtocolError::Runtime`] for other failures.
    async fn start(&mut self) -> ProtocolResult<()>;

    /// Stops serving and releases the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Runtime`] when shutdown fails.
    async fn stop(&mut self) -> ProtocolResult<()>;

    /// Returns the endpoint URI the instance binds.
    fn endpoint(&self) -> &str;
}

/// Factory for protocol server instances.
pub trait ProtocolHost: Send + Sync {
    /// Instance type produced by this host.
    type Server: ProtocolServer + 'static;

    /// Creates an unstarted instance for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Runtime`] when the instance cannot be built.
    fn create(&self, endpoint: &str) -> ProtocolResult<Self::Server>;
}

/// Errors returned by protocol host adapters.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// Another instance already binds the endpoint.
    #[error("endpoint {0} is already bound")]
    AddressInUse(String),

    /// A variable could not be added to the address space.
    #[error("cannot add variable {address}: {reason}")]
    InvalidVariable {
        /// Node address of the rejected variable.
        address: String,
        /// Reason reported by the protocol library.
        reason: String,
    },

    /// The instance is not serving.
    #[error("protocol server at {0} is not running")]
    NotRunning(String),

    /// Generic protocol runtime failure.
    #[error("protocol runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProtocolError {
    /// Wraps a runtime error from the protocol library.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
