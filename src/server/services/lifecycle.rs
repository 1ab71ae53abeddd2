//! Service layer for server lifecycle orchestration.

use super::provision::{ProvisionWarning, provision_nodes};
use super::registry::{RuntimeServerHandle, ServerRegistry, StopClaim};
use crate::node::ports::{NodeRepository, NodeRepositoryError};
use crate::server::{
    domain::{
        ServerDescriptor, ServerDomainError, ServerId, ServerStatus, ServerStatusEvent,
        endpoint_for, namespace_uri_for,
    },
    ports::{
        ProtocolError, ProtocolHost, ProtocolServer, ServerRepository, ServerRepositoryError,
        StatusPublisher,
    },
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Service-level errors for lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ServerDomainError),
    /// Server persistence failed.
    #[error(transparent)]
    Repository(#[from] ServerRepositoryError),
    /// Node persistence failed while provisioning.
    #[error(transparent)]
    NodeRepository(#[from] NodeRepositoryError),
    /// The protocol instance failed to start or stop.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// No server exists with the given identifier.
    #[error("server {0} not found")]
    NotFound(ServerId),
    /// The server is already running or being started.
    #[error("server {0} is already running")]
    AlreadyRunning(ServerId),
    /// A start or stop for the server has not finished yet.
    #[error("a start or stop is already in progress for server {0}")]
    OperationInProgress(ServerId),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Result of a successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    /// Server as persisted after the transition to running.
    pub server: ServerDescriptor,
    /// Endpoint the instance is bound to.
    pub endpoint: String,
    /// Nodes provisioned in degraded form or skipped.
    pub warnings: Vec<ProvisionWarning>,
}

/// Result of a successful stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    /// Server as persisted after the transition to stopped.
    pub server: ServerDescriptor,
    /// Whether a live instance was shut down.
    pub was_running: bool,
}

/// Counts reported by the process-shutdown sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Live instances stopped cleanly.
    pub stopped: usize,
    /// Live instances whose stop failed.
    pub failed: usize,
    /// Persisted descriptors forced back to stopped.
    pub reset: usize,
}

/// Releases a registry claim when dropped.
///
/// Installed handles are not affected, so the guard can be dropped on every
/// exit path.
struct ClaimGuard<'a, S> {
    registry: &'a ServerRegistry<S>,
    id: ServerId,
}

impl<S> Drop for ClaimGuard<'_, S> {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// Starts and stops protocol servers and keeps the runtime registry,
/// persisted status, and subscribers consistent.
pub struct LifecycleOrchestrator<R, N, H, P, C>
where
    R: ServerRepository,
    N: NodeRepository,
    H: ProtocolHost,
    P: StatusPublisher,
    C: Clock + Send + Sync,
{
    servers: Arc<R>,
    nodes: Arc<N>,
    host: Arc<H>,
    publisher: Arc<P>,
    clock: Arc<C>,
    registry: Arc<ServerRegistry<H::Server>>,
}

impl<R, N, H, P, C> Clone for LifecycleOrchestrator<R, N, H, P, C>
where
    R: ServerRepository,
    N: NodeRepository,
    H: ProtocolHost,
    P: StatusPublisher,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            servers: Arc::clone(&self.servers),
            nodes: Arc::clone(&self.nodes),
            host: Arc::clone(&self.host),
            publisher: Arc::clone(&self.publisher),
            clock: Arc::clone(&self.clock),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R, N, H, P, C> LifecycleOrchestrator<R, N, H, P, C>
where
    R: ServerRepository,
    N: NodeRepository,
    H: ProtocolHost,
    P: StatusPublisher,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator with an empty registry.
    #[must_use]
    pub fn new(
        servers: Arc<R>,
        nodes: Arc<N>,
        host: Arc<H>,
        publisher: Arc<P>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            servers,
            nodes,
            host,
            publisher,
            clock,
            registry: Arc::new(ServerRegistry::new()),
        }
    }

    /// Returns the runtime registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ServerRegistry<H::Server>> {
        &self.registry
    }

    async fn find_server_or_error(&self, id: ServerId) -> LifecycleResult<ServerDescriptor> {
        self.servers
            .find_by_id(id)
            .await?
            .ok_or(LifecycleError::NotFound(id))
    }

    /// Starts a server and provisions its nodes.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for an unknown identifier,
    /// [`LifecycleError::AlreadyRunning`] when the server is running or
    /// being started, [`ServerDomainError::PortInUse`] when another running
    /// server owns the port, and protocol or persistence errors. A failure
    /// after the server was marked starting leaves it in `error`.
    pub async fn start(&self, id: ServerId) -> LifecycleResult<StartOutcome> {
        let mut server = self.find_server_or_error(id).await?;
        if !self.registry.try_acquire(id) {
            warn!(server_id = %id, "start rejected: server already running");
            return Err(LifecycleError::AlreadyRunning(id));
        }
        let _claim = ClaimGuard {
            registry: &*self.registry,
            id,
        };

        self.ensure_port_free(&server).await?;
        if matches!(
            server.status(),
            ServerStatus::Starting | ServerStatus::Running
        ) {
            warn!(server_id = %id, status = %server.status(), "discarding stale status");
            server.force_stopped();
        }

        server.begin_start(&*self.clock)?;
        let mut starting = self.persist_and_publish(&server).await?;
        info!(server_id = %id, name = %starting.name(), port = %starting.port(), "starting server");

        let (mut instance, warnings) = match self.launch(&starting).await {
            Ok(launched) => launched,
            Err(err) => {
                error!(server_id = %id, error = %err, "server failed to start");
                self.record_failure(&mut starting).await;
                return Err(err);
            }
        };

        let endpoint = instance.endpoint().to_owned();
        let running = match self.commit_running(&starting, &endpoint).await {
            Ok(running) => running,
            Err(err) => {
                error!(server_id = %id, error = %err, "cannot record running server");
                if let Err(stop_err) = instance.stop().await {
                    warn!(server_id = %id, error = %stop_err, "cannot stop unrecorded instance");
                }
                self.record_failure(&mut starting).await;
                return Err(err);
            }
        };

        // Installing ends the claim: the handle is visible only once RUNNING is stored.
        let started_at = running.last_started().unwrap_or_else(|| self.clock.utc());
        self.registry.install(RuntimeServerHandle::new(
            id,
            endpoint.clone(),
            started_at,
            instance,
        ));
        info!(
            server_id = %id,
            endpoint = %endpoint,
            skipped_or_degraded = warnings.len(),
            "server running"
        );
        Ok(StartOutcome {
            server: running,
            endpoint,
            warnings,
        })
    }

    /// Stops a server.
    ///
    /// Stopping a server without a live instance reasserts `stopped` and
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotFound`] for an unknown identifier,
    /// [`LifecycleError::OperationInProgress`] while a start or stop is in
    /// flight, and protocol errors from the instance, in which case the
    /// server is left in `error` and its handle is discarded.
    pub async fn stop(&self, id: ServerId) -> LifecycleResult<StopOutcome> {
        let mut server = self.find_server_or_error(id).await?;
        let handle = match self.registry.take_for_stop(id) {
            StopClaim::InProgress => {
                warn!(server_id = %id, "stop rejected: operation in progress");
                return Err(LifecycleError::OperationInProgress(id));
            }
            StopClaim::NotRegistered => {
                server.force_stopped();
                let stopped = self.persist_and_publish(&server).await?;
                info!(server_id = %id, "server already stopped");
                return Ok(StopOutcome {
                    server: stopped,
                    was_running: false,
                });
            }
            StopClaim::Claimed(handle) => handle,
        };
        let _claim = ClaimGuard {
            registry: &*self.registry,
            id,
        };

        let endpoint = handle.endpoint().to_owned();
        let mut instance = handle.into_instance();
        if let Err(err) = instance.stop().await {
            error!(server_id = %id, endpoint = %endpoint, error = %err, "server failed to stop");
            self.record_failure(&mut server).await;
            return Err(err.into());
        }

        if server.mark_stopped(&*self.clock).is_err() {
            server.force_stopped();
        }
        let stopped = self.persist_and_publish(&server).await?;
        info!(
            server_id = %id,
            endpoint = %endpoint,
            uptime_seconds = stopped.uptime_seconds(),
            "server stopped"
        );
        Ok(StopOutcome {
            server: stopped,
            was_running: true,
        })
    }

    /// Forces every persisted server without a live instance to `stopped`.
    ///
    /// Run once at boot: no instance survives a restart, so persisted
    /// `running` and `starting` states are stale.
    ///
    /// # Errors
    ///
    /// Returns persistence errors.
    pub async fn recover(&self) -> LifecycleResult<usize> {
        let mut reset = 0;
        for mut server in self.servers.list_all().await? {
            if self.registry.is_running(server.id()) || is_at_rest(&server) {
                continue;
            }
            warn!(server_id = %server.id(), status = %server.status(), "resetting stale status");
            server.force_stopped();
            self.persist_and_publish(&server).await?;
            reset += 1;
        }
        info!(reset, "recovery sweep complete");
        Ok(reset)
    }

    /// Stops every live instance and forces every persisted server to
    /// `stopped`.
    ///
    /// Failures are logged and never returned.
    pub async fn shutdown(&self) -> ShutdownSummary {
        let mut summary = ShutdownSummary::default();
        for id in self.registry.snapshot() {
            match self.stop(id).await {
                Ok(_) => summary.stopped += 1,
                Err(err) => {
                    error!(server_id = %id, error = %err, "stop failed during shutdown");
                    summary.failed += 1;
                }
            }
        }

        let servers = match self.servers.list_all().await {
            Ok(servers) => servers,
            Err(err) => {
                error!(error = %err, "cannot list servers during shutdown");
                return summary;
            }
        };
        for mut server in servers {
            if is_at_rest(&server) {
                continue;
            }
            let id = server.id();
            if let Some(handle) = self.registry.remove(id) {
                warn!(server_id = %id, endpoint = %handle.endpoint(), "abandoning live instance");
            }
            server.force_stopped();
            match self.persist_and_publish(&server).await {
                Ok(_) => summary.reset += 1,
                Err(err) => error!(server_id = %id, error = %err, "cannot reset server"),
            }
        }
        info!(
            stopped = summary.stopped,
            failed = summary.failed,
            reset = summary.reset,
            "shutdown sweep complete"
        );
        summary
    }

    async fn ensure_port_free(&self, server: &ServerDescriptor) -> LifecycleResult<()> {
        let owner = self.servers.list_all().await?.into_iter().find(|other| {
            other.id() != server.id()
                && other.port() == server.port()
                && other.status() == ServerStatus::Running
        });
        let Some(owner) = owner else {
            return Ok(());
        };
        warn!(server_id = %server.id(), port = %server.port(), owner = %owner.id(), "port in use");
        Err(ServerDomainError::PortInUse {
            port: server.port(),
            owner: owner.id(),
        }
        .into())
    }

    async fn launch(
        &self,
        server: &ServerDescriptor,
    ) -> LifecycleResult<(H::Server, Vec<ProvisionWarning>)> {
        let mut instance = self.host.create(&endpoint_for(server.port()))?;
        instance.set_server_name(server.name().as_str());
        let namespace_index = instance.register_namespace(&namespace_uri_for(server.name()))?;

        let nodes = self.nodes.find_by_server(server.id()).await?;
        let warnings = provision_nodes(&mut instance, namespace_index, &nodes);

        instance.start().await?;
        Ok((instance, warnings))
    }

    async fn commit_running(
        &self,
        starting: &ServerDescriptor,
        endpoint: &str,
    ) -> LifecycleResult<ServerDescriptor> {
        let mut running = starting.clone();
        running.mark_running(endpoint.to_owned())?;
        self.persist_and_publish(&running).await
    }

    async fn record_failure(&self, server: &mut ServerDescriptor) {
        if let Err(err) = server.mark_error() {
            warn!(server_id = %server.id(), error = %err, "cannot mark server failed");
            return;
        }
        if let Err(err) = self.persist_and_publish(server).await {
            error!(server_id = %server.id(), error = %err, "cannot persist failed status");
        }
    }

    async fn persist_and_publish(
        &self,
        server: &ServerDescriptor,
    ) -> LifecycleResult<ServerDescriptor> {
        let stored = self
            .servers
            .update_status(server.id(), server.status_update())
            .await?;
        self.publisher
            .publish(&ServerStatusEvent::from(&stored))
            .await;
        Ok(stored)
    }
}

fn is_at_rest(server: &ServerDescriptor) -> bool {
    server.status() == ServerStatus::Stopped && server.endpoint().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::adapters::memory::InMemoryNodeRepository;
    use crate::node::domain::{AccessMode, DataType, NodeDefinition, NodeSpec};
    use crate::server::adapters::{memory::InMemoryServerRepository, runtime::InMemoryProtocolHost};
    use crate::server::domain::{Port, ServerDefinition, ServerName, ServerStatusUpdate};
    use crate::server::ports::ServerRepositoryResult;
    use async_trait::async_trait;
    use mockable::DefaultClock;
    use mockall::{Sequence, mock};
    use rstest::{fixture, rstest};
    use std::time::Duration;

    mock! {
        Publisher {}

        #[async_trait]
        impl StatusPublisher for Publisher {
            async fn publish(&self, event: &ServerStatusEvent);
        }
    }

    type TestOrchestrator = LifecycleOrchestrator<
        InMemoryServerRepository,
        InMemoryNodeRepository,
        InMemoryProtocolHost,
        MockPublisher,
        DefaultClock,
    >;

    struct Harness {
        servers: Arc<InMemoryServerRepository>,
        nodes: Arc<InMemoryNodeRepository>,
        host: Arc<InMemoryProtocolHost>,
    }

    impl Harness {
        fn orchestrator(&self, publisher: MockPublisher) -> TestOrchestrator {
            LifecycleOrchestrator::new(
                Arc::clone(&self.servers),
                Arc::clone(&self.nodes),
                Arc::clone(&self.host),
                Arc::new(publisher),
                Arc::new(DefaultClock),
            )
        }

        async fn server(&self, name: &str, port: u16) -> ServerId {
            self.servers
                .create(ServerDefinition::new(
                    ServerName::new(name).expect("valid server name"),
                    Port::new(port).expect("valid port"),
                ))
                .await
                .expect("server should be stored")
                .id()
        }

        async fn node(&self, spec: NodeSpec) {
            self.nodes
                .create(NodeDefinition::new(spec).expect("valid node"))
                .await
                .expect("node should be stored");
        }
    }

    /// Delays, then optionally fails, the write that records a server as running.
    struct GatedRepository {
        inner: Arc<InMemoryServerRepository>,
        running_delay: Duration,
        fail_running: bool,
    }

    #[async_trait]
    impl ServerRepository for GatedRepository {
        async fn create(
            &self,
            definition: ServerDefinition,
        ) -> ServerRepositoryResult<ServerDescriptor> {
            self.inner.create(definition).await
        }

        async fn find_by_id(&self, id: ServerId) -> ServerRepositoryResult<Option<ServerDescriptor>> {
            self.inner.find_by_id(id).await
        }

        async fn list_all(&self) -> ServerRepositoryResult<Vec<ServerDescriptor>> {
            self.inner.list_all().await
        }

        async fn update_status(
            &self,
            id: ServerId,
            update: ServerStatusUpdate,
        ) -> ServerRepositoryResult<ServerDescriptor> {
            if update.status == ServerStatus::Running {
                tokio::time::sleep(self.running_delay).await;
                if self.fail_running {
                    return Err(ServerRepositoryError::persistence(std::io::Error::other(
                        "status table is read-only",
                    )));
                }
            }
            self.inner.update_status(id, update).await
        }
    }

    type GatedOrchestrator = LifecycleOrchestrator<
        GatedRepository,
        InMemoryNodeRepository,
        InMemoryProtocolHost,
        MockPublisher,
        DefaultClock,
    >;

    impl Harness {
        fn gated_orchestrator(
            &self,
            running_delay: Duration,
            fail_running: bool,
        ) -> GatedOrchestrator {
            LifecycleOrchestrator::new(
                Arc::new(GatedRepository {
                    inner: Arc::clone(&self.servers),
                    running_delay,
                    fail_running,
                }),
                Arc::clone(&self.nodes),
                Arc::clone(&self.host),
                Arc::new(silent_publisher()),
                Arc::new(DefaultClock),
            )
        }

        async fn stored_status(&self, id: ServerId) -> ServerStatus {
            self.servers
                .find_by_id(id)
                .await
                .expect("repository should answer")
                .expect("server should exist")
                .status()
        }
    }

    #[fixture]
    fn harness() -> Harness {
        Harness {
            servers: Arc::new(InMemoryServerRepository::new()),
            nodes: Arc::new(InMemoryNodeRepository::new()),
            host: Arc::new(InMemoryProtocolHost::new()),
        }
    }

    fn silent_publisher() -> MockPublisher {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().return_const(());
        publisher
    }

    fn expect_statuses(publisher: &mut MockPublisher, statuses: &[ServerStatus]) {
        let mut sequence = Sequence::new();
        for status in statuses.iter().copied() {
            publisher
                .expect_publish()
                .withf(move |event| event.status == status)
                .times(1)
                .in_sequence(&mut sequence)
                .return_const(());
        }
    }

    #[rstest]
    #[tokio::test]
    async fn start_publishes_starting_then_running(harness: Harness) {
        let id = harness.server("Boiler", 4840).await;
        let mut publisher = MockPublisher::new();
        expect_statuses(&mut publisher, &[ServerStatus::Starting, ServerStatus::Running]);
        let orchestrator = harness.orchestrator(publisher);

        let outcome = orchestrator.start(id).await.expect("start should succeed");

        assert_eq!(outcome.server.status(), ServerStatus::Running);
        assert_eq!(outcome.endpoint, "opc.tcp://0.0.0.0:4840/freeopcua/server/");
        assert_eq!(outcome.server.endpoint(), Some(outcome.endpoint.as_str()));
        assert!(orchestrator.registry().is_running(id));
    }

    #[rstest]
    #[tokio::test]
    async fn start_provisions_nodes_with_downgrades(harness: Harness) {
        let id = harness.server("Mixer", 4841).await;
        harness
            .node(
                NodeSpec::new("Speed", "ns=2;s=Speed", DataType::Double)
                    .with_initial_value("12.5")
                    .with_access(AccessMode::Read)
                    .with_description("Rotor speed")
                    .on_server(id),
            )
            .await;
        harness
            .node(NodeSpec::new("Status", "ns=2;s=Status", DataType::Statuscode).on_server(id))
            .await;
        harness.host.reject_address("ns=2;s=Broken").expect("host state");
        harness
            .node(NodeSpec::new("Broken", "ns=2;s=Broken", DataType::Int32).on_server(id))
            .await;
        let orchestrator = harness.orchestrator(silent_publisher());

        let outcome = orchestrator.start(id).await.expect("start should succeed");

        assert_eq!(outcome.warnings.len(), 2);
        assert!(matches!(
            outcome.warnings.first(),
            Some(ProvisionWarning::UnsupportedDataType {
                data_type: DataType::Statuscode,
                ..
            })
        ));
        assert!(matches!(
            outcome.warnings.get(1),
            Some(ProvisionWarning::VariableRejected { .. })
        ));
        let published = harness
            .host
            .published(&outcome.endpoint)
            .expect("host state")
            .expect("instance should be bound");
        assert_eq!(published.namespaces, vec!["urn:Mixer".to_owned()]);
        assert_eq!(published.name.as_deref(), Some("Mixer"));
        let speed = published.variables.first().expect("speed variable");
        assert!(!speed.writable);
        assert_eq!(speed.description.as_deref(), Some("Rotor speed"));
    }

    #[rstest]
    #[tokio::test]
    async fn second_start_is_rejected(harness: Harness) {
        let id = harness.server("Press", 4842).await;
        let orchestrator = harness.orchestrator(silent_publisher());
        orchestrator.start(id).await.expect("first start should succeed");

        let result = orchestrator.start(id).await;

        assert!(matches!(result, Err(LifecycleError::AlreadyRunning(rejected)) if rejected == id));
        assert_eq!(harness.host.bound_count().expect("host state"), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_start_marks_error_and_releases_claim(harness: Harness) {
        let id = harness.server("Kiln", 4843).await;
        harness
            .host
            .fail_start("opc.tcp://0.0.0.0:4843/freeopcua/server/")
            .expect("host state");
        let mut publisher = MockPublisher::new();
        expect_statuses(
            &mut publisher,
            &[
                ServerStatus::Starting,
                ServerStatus::Error,
                ServerStatus::Starting,
                ServerStatus::Running,
            ],
        );
        let orchestrator = harness.orchestrator(publisher);

        let result = orchestrator.start(id).await;
        assert!(matches!(result, Err(LifecycleError::Protocol(_))));
        let stored = harness
            .servers
            .find_by_id(id)
            .await
            .expect("repository should answer")
            .expect("server should exist");
        assert_eq!(stored.status(), ServerStatus::Error);
        assert!(!orchestrator.registry().is_running(id));

        harness.host.clear_failures().expect("host state");
        let retried = orchestrator.start(id).await.expect("retry should succeed");
        assert_eq!(retried.server.status(), ServerStatus::Running);
    }

    #[rstest]
    #[tokio::test]
    async fn port_owned_by_running_server_is_refused(harness: Harness) {
        let first = harness.server("Line A", 4844).await;
        let second = harness.server("Line B", 4844).await;
        let orchestrator = harness.orchestrator(silent_publisher());
        orchestrator.start(first).await.expect("first start should succeed");

        let result = orchestrator.start(second).await;

        assert!(matches!(
            result,
            Err(LifecycleError::Domain(ServerDomainError::PortInUse { owner, .. })) if owner == first
        ));
        assert!(orchestrator.registry().try_acquire(second));
    }

    #[rstest]
    #[tokio::test]
    async fn stop_is_idempotent(harness: Harness) {
        let id = harness.server("Idle", 4845).await;
        let mut publisher = MockPublisher::new();
        expect_statuses(&mut publisher, &[ServerStatus::Stopped, ServerStatus::Stopped]);
        let orchestrator = harness.orchestrator(publisher);

        for _ in 0..2 {
            let outcome = orchestrator.stop(id).await.expect("stop should succeed");
            assert!(!outcome.was_running);
            assert_eq!(outcome.server.status(), ServerStatus::Stopped);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn stop_releases_instance(harness: Harness) {
        let id = harness.server("Conveyor", 4846).await;
        let orchestrator = harness.orchestrator(silent_publisher());
        orchestrator.start(id).await.expect("start should succeed");

        let outcome = orchestrator.stop(id).await.expect("stop should succeed");

        assert!(outcome.was_running);
        assert_eq!(outcome.server.endpoint(), None);
        assert!(orchestrator.registry().snapshot().is_empty());
        assert_eq!(harness.host.bound_count().expect("host state"), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_stop_marks_error_and_drops_handle(harness: Harness) {
        let id = harness.server("Crusher", 4847).await;
        harness
            .host
            .fail_stop("opc.tcp://0.0.0.0:4847/freeopcua/server/")
            .expect("host state");
        let orchestrator = harness.orchestrator(silent_publisher());
        orchestrator.start(id).await.expect("start should succeed");

        let result = orchestrator.stop(id).await;

        assert!(matches!(result, Err(LifecycleError::Protocol(_))));
        assert!(!orchestrator.registry().is_running(id));
        let stored = harness
            .servers
            .find_by_id(id)
            .await
            .expect("repository should answer")
            .expect("server should exist");
        assert_eq!(stored.status(), ServerStatus::Error);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_server_is_not_found(harness: Harness) {
        let orchestrator = harness.orchestrator(MockPublisher::new());
        let missing = ServerId::new(99);

        assert!(matches!(
            orchestrator.start(missing).await,
            Err(LifecycleError::NotFound(id)) if id == missing
        ));
        assert!(matches!(
            orchestrator.stop(missing).await,
            Err(LifecycleError::NotFound(id)) if id == missing
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn shutdown_stops_everything(harness: Harness) {
        let running = harness.server("Running", 4848).await;
        let failed = harness.server("Failed", 4849).await;
        harness
            .host
            .fail_start("opc.tcp://0.0.0.0:4849/freeopcua/server/")
            .expect("host state");
        let orchestrator = harness.orchestrator(silent_publisher());
        orchestrator.start(running).await.expect("start should succeed");
        assert!(orchestrator.start(failed).await.is_err());

        let summary = orchestrator.shutdown().await;

        assert_eq!(summary.stopped, 1);
        assert_eq!(summary.reset, 1);
        for server in harness.servers.list_all().await.expect("servers should list") {
            assert_eq!(server.status(), ServerStatus::Stopped);
            assert_eq!(server.endpoint(), None);
        }
        assert_eq!(harness.host.bound_count().expect("host state"), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn stop_during_running_write_is_rejected(harness: Harness) {
        let id = harness.server("Kiln", 4850).await;
        let orchestrator = harness.gated_orchestrator(Duration::from_millis(60), false);
        let starter = orchestrator.clone();
        let start = tokio::spawn(async move { starter.start(id).await });
        tokio::time::sleep(Duration::from_millis(15)).await;

        let stop = orchestrator.stop(id).await;

        assert!(matches!(stop, Err(LifecycleError::OperationInProgress(busy)) if busy == id));
        let outcome = start
            .await
            .expect("start task should join")
            .expect("start should succeed");
        assert_eq!(outcome.server.status(), ServerStatus::Running);
        assert!(orchestrator.registry().is_running(id));
        assert_eq!(harness.stored_status(id).await, ServerStatus::Running);

        let stopped = orchestrator.stop(id).await.expect("stop should succeed");
        assert!(stopped.was_running);
        assert_eq!(harness.stored_status(id).await, ServerStatus::Stopped);
        assert_eq!(harness.host.bound_count().expect("host state"), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_running_write_stops_instance(harness: Harness) {
        let id = harness.server("Boiler", 4851).await;
        let orchestrator = harness.gated_orchestrator(Duration::ZERO, true);

        let result = orchestrator.start(id).await;

        assert!(matches!(result, Err(LifecycleError::Repository(_))));
        assert!(!orchestrator.registry().is_running(id));
        assert!(orchestrator.registry().snapshot().is_empty());
        assert_eq!(harness.host.bound_count().expect("host state"), 0);
        assert_eq!(harness.stored_status(id).await, ServerStatus::Error);
        assert!(orchestrator.registry().try_acquire(id));
    }
}
