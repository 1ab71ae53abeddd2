//! In-process simulated protocol host.
//!
//! Instances bind nothing on the network. The host tracks which endpoints
//! are bound so that a second instance on the same endpoint fails like a
//! real bind would, records each instance's address space for inspection,
//! and can be told to fail specific operations.

use crate::server::ports::{
    ProtocolError, ProtocolHost, ProtocolResult, ProtocolServer, VariableSpec,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Address space of a bound simulated instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishedServer {
    /// Application name set on the instance.
    pub name: Option<String>,
    /// Registered namespace URIs in index order, starting at index 1.
    pub namespaces: Vec<String>,
    /// Variables added before start.
    pub variables: Vec<VariableSpec>,
}

/// Simulated protocol host shared by all of its instances.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProtocolHost {
    state: Arc<RwLock<InMemoryHostState>>,
}

#[derive(Debug, Default)]
struct InMemoryHostState {
    bound: HashMap<String, PublishedServer>,
    failing_starts: HashSet<String>,
    failing_stops: HashSet<String>,
    rejected_addresses: HashSet<String>,
    start_delay: Duration,
}

fn lock_error(err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::runtime(std::io::Error::other(err.to_string()))
}

impl InMemoryProtocolHost {
    /// Creates a host with no bound endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later start on `endpoint` fail.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn fail_start(&self, endpoint: impl Into<String>) -> ProtocolResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.failing_starts.insert(endpoint.into());
        Ok(())
    }

    /// Makes every later stop on `endpoint` fail.
    ///
    /// The endpoint is still released, as a crashed instance would release
    /// its socket.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn fail_stop(&self, endpoint: impl Into<String>) -> ProtocolResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.failing_stops.insert(endpoint.into());
        Ok(())
    }

    /// Makes adding a variable at `address` fail on every instance.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn reject_address(&self, address: impl Into<String>) -> ProtocolResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.rejected_addresses.insert(address.into());
        Ok(())
    }

    /// Clears all injected failures.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn clear_failures(&self) -> ProtocolResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.failing_starts.clear();
        state.failing_stops.clear();
        state.rejected_addresses.clear();
        Ok(())
    }

    /// Delays every later start by `delay` before binding.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn set_start_delay(&self, delay: Duration) -> ProtocolResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.start_delay = delay;
        Ok(())
    }

    /// Returns the address space of the instance bound on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn published(&self, endpoint: &str) -> ProtocolResult<Option<PublishedServer>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.bound.get(endpoint).cloned())
    }

    /// Returns the number of bound endpoints.
    ///
    /// # Errors
    ///
    /// Returns runtime errors when lock acquisition fails.
    pub fn bound_count(&self) -> ProtocolResult<usize> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.bound.len())
    }
}

impl ProtocolHost for InMemoryProtocolHost {
    type Server = InMemoryProtocolServer;

    fn create(&self, endpoint: &str) -> ProtocolResult<Self::Server> {
        Ok(InMemoryProtocolServer {
            endpoint: endpoint.to_owned(),
            state: Arc::clone(&self.state),
            space: PublishedServer::default(),
            running: false,
        })
    }
}

/// Simulated protocol server instance.
#[derive(Debug)]
pub struct InMemoryProtocolServer {
    endpoint: String,
    state: Arc<RwLock<InMemoryHostState>>,
    space: PublishedServer,
    running: bool,
}

#[async_trait]
impl ProtocolServer for InMemoryProtocolServer {
    fn set_server_name(&mut self, name: &str) {
        self.space.name = Some(name.to_owned());
    }

    fn register_namespace(&mut self, uri: &str) -> ProtocolResult<u16> {
        if let Some(position) = self.space.namespaces.iter().position(|known| known == uri) {
            return u16::try_from(position + 1).map_err(ProtocolError::runtime);
        }
        self.space.namespaces.push(uri.to_owned());
        u16::try_from(self.space.namespaces.len()).map_err(ProtocolError::runtime)
    }

    fn add_variable(&mut self, variable: VariableSpec) -> ProtocolResult<()> {
        let address = variable.address.as_str().to_owned();
        let rejected = self
            .state
            .read()
            .map_err(lock_error)?
            .rejected_addresses
            .contains(&address);
        if rejected {
            return Err(ProtocolError::InvalidVariable {
                address,
                reason: "rejected by host".to_owned(),
            });
        }
        if self
            .space
            .variables
            .iter()
            .any(|known| known.address == variable.address)
        {
            return Err(ProtocolError::InvalidVariable {
                address,
                reason: "node id already exists".to_owned(),
            });
        }
        self.space.variables.push(variable);
        Ok(())
    }

    async fn start(&mut self) -> ProtocolResult<()> {
        let delay = self.state.read().map_err(lock_error)?.start_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().map_err(lock_error)?;
        if state.failing_starts.contains(&self.endpoint) {
            return Err(ProtocolError::runtime(std::io::Error::other(format!(
                "simulated start failure on {}",
                self.endpoint
            ))));
        }
        if state.bound.contains_key(&self.endpoint) {
            return Err(ProtocolError::AddressInUse(self.endpoint.clone()));
        }
        state.bound.insert(self.endpoint.clone(), self.space.clone());
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> ProtocolResult<()> {
        if !self.running {
            return Err(ProtocolError::NotRunning(self.endpoint.clone()));
        }
        let mut state = self.state.write().map_err(lock_error)?;
        state.bound.remove(&self.endpoint);
        self.running = false;
        if state.failing_stops.contains(&self.endpoint) {
            return Err(ProtocolError::runtime(std::io::Error::other(format!(
                "simulated stop failure on {}",
                self.endpoint
            ))));
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::domain::{NodeAddress, TypedValue};

    const ENDPOINT: &str = "opc.tcp://0.0.0.0:4840/freeopcua/server/";

    fn variable(address: &str) -> VariableSpec {
        VariableSpec {
            namespace_index: 1,
            address: NodeAddress::parse(address).expect("valid address"),
            browse_name: "Temperature".to_owned(),
            value: TypedValue::Double(21.5),
            writable: true,
            description: None,
        }
    }

    #[tokio::test]
    async fn second_bind_on_same_endpoint_fails() {
        let host = InMemoryProtocolHost::new();
        let mut first = host.create(ENDPOINT).expect("instance should build");
        let mut second = host.create(ENDPOINT).expect("instance should build");

        first.start().await.expect("first bind should succeed");
        let result = second.start().await;

        assert!(matches!(result, Err(ProtocolError::AddressInUse(_))));
        assert_eq!(host.bound_count().expect("host state"), 1);
    }

    #[tokio::test]
    async fn stop_releases_the_endpoint() {
        let host = InMemoryProtocolHost::new();
        let mut instance = host.create(ENDPOINT).expect("instance should build");
        instance.start().await.expect("bind should succeed");
        instance.stop().await.expect("stop should succeed");

        assert_eq!(host.bound_count().expect("host state"), 0);
        assert!(matches!(
            instance.stop().await,
            Err(ProtocolError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn address_space_is_published_on_start() {
        let host = InMemoryProtocolHost::new();
        let mut instance = host.create(ENDPOINT).expect("instance should build");
        instance.set_server_name("Boiler");
        let index = instance
            .register_namespace("urn:Boiler")
            .expect("namespace should register");
        instance
            .add_variable(variable("ns=1;s=Temp"))
            .expect("variable should be added");
        instance.start().await.expect("bind should succeed");

        let published = host
            .published(ENDPOINT)
            .expect("host state")
            .expect("instance should be bound");
        assert_eq!(index, 1);
        assert_eq!(published.name.as_deref(), Some("Boiler"));
        assert_eq!(published.namespaces, vec!["urn:Boiler".to_owned()]);
        assert_eq!(published.variables.len(), 1);
    }

    #[test]
    fn rejected_and_duplicate_variables_fail() {
        let host = InMemoryProtocolHost::new();
        host.reject_address("i=7").expect("host state");
        let mut instance = host.create(ENDPOINT).expect("instance should build");

        assert!(matches!(
            instance.add_variable(variable("i=7")),
            Err(ProtocolError::InvalidVariable { .. })
        ));
        instance
            .add_variable(variable("i=8"))
            .expect("variable should be added");
        assert!(matches!(
            instance.add_variable(variable("i=8")),
            Err(ProtocolError::InvalidVariable { .. })
        ));
    }

    #[tokio::test]
    async fn injected_start_failure_leaves_endpoint_free() {
        let host = InMemoryProtocolHost::new();
        host.fail_start(ENDPOINT).expect("host state");
        let mut instance = host.create(ENDPOINT).expect("instance should build");

        assert!(matches!(
            instance.start().await,
            Err(ProtocolError::Runtime(_))
        ));
        assert_eq!(host.bound_count().expect("host state"), 0);
    }
}
