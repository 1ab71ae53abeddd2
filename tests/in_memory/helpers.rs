//! Shared fixtures for in-memory integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mockable::DefaultClock;
use opcua_fleet::node::{
    adapters::memory::InMemoryNodeRepository,
    services::{NodeValueService, ValueChangeEngine},
};
use opcua_fleet::server::{
    adapters::{memory::InMemoryServerRepository, runtime::InMemoryProtocolHost},
    domain::{Port, ServerDefinition, ServerDescriptor, ServerName, ServerStatus, ServerStatusEvent},
    ports::{ServerRepository, StatusPublisher},
    services::LifecycleOrchestrator,
};
use rstest::fixture;

/// Publisher that records every event in order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ServerStatusEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<ServerStatusEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn statuses(&self) -> Vec<ServerStatus> {
        self.events().iter().map(|event| event.status).collect()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(&self, event: &ServerStatusEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

pub type TestOrchestrator = LifecycleOrchestrator<
    InMemoryServerRepository,
    InMemoryNodeRepository,
    InMemoryProtocolHost,
    RecordingPublisher,
    DefaultClock,
>;

pub struct Fleet {
    pub servers: Arc<InMemoryServerRepository>,
    pub host: Arc<InMemoryProtocolHost>,
    pub publisher: Arc<RecordingPublisher>,
    pub orchestrator: TestOrchestrator,
    pub nodes: NodeValueService<InMemoryNodeRepository>,
}

impl Fleet {
    pub fn new() -> Self {
        let servers = Arc::new(InMemoryServerRepository::new());
        let node_repository = Arc::new(InMemoryNodeRepository::new());
        let host = Arc::new(InMemoryProtocolHost::new());
        let publisher = Arc::new(RecordingPublisher::default());
        let orchestrator = LifecycleOrchestrator::new(
            Arc::clone(&servers),
            Arc::clone(&node_repository),
            Arc::clone(&host),
            Arc::clone(&publisher),
            Arc::new(DefaultClock),
        );
        let nodes = NodeValueService::new(node_repository, Arc::new(ValueChangeEngine::with_seed(7)));
        Self {
            servers,
            host,
            publisher,
            orchestrator,
            nodes,
        }
    }

    pub async fn add_server(&self, name: &str, port: u16) -> ServerDescriptor {
        self.servers
            .create(ServerDefinition::new(
                ServerName::new(name).expect("valid server name"),
                Port::new(port).expect("valid port"),
            ))
            .await
            .expect("server should be stored")
    }
}

#[fixture]
pub fn fleet() -> Fleet {
    Fleet::new()
}
