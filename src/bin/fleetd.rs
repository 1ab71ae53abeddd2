//! Hosts a fleet of simulated protocol servers behind an HTTP control
//! surface and a WebSocket status channel.
//!
//! Usage:
//!
//! ```text
//! opcua-fleetd [--listen <addr>] [--seed <path>] [--max-connections <n>]
//!              [--heartbeat-timeout-ms <ms>] [--log-filter <filter>]
//! ```
//!
//! The optional seed file pre-populates servers and nodes. A representative
//! seed is:
//!
//! ```json
//! {
//!   "servers": [{ "name": "Boiler House", "port": 4840 }],
//!   "nodes": [
//!     {
//!       "name": "Temperature{1-3}",
//!       "node_id": "ns=2;s=Temp{1-3}",
//!       "data_type": "DOUBLE",
//!       "initial_value": "21.5",
//!       "serverIds": [1]
//!     }
//!   ]
//! }
//! ```
//!
//! Every persisted server is reset to `stopped` at boot. On Ctrl-C or
//! SIGTERM all live instances are stopped before the listener closes.

use axum::{Router, routing::get};
use clap::Parser;
use mockable::DefaultClock;
use opcua_fleet::node::{
    adapters::memory::InMemoryNodeRepository,
    domain::NodeSpec,
    services::{NodeValueService, NodeValueServiceError, ValueChangeEngine},
};
use opcua_fleet::server::{
    adapters::{
        http::lifecycle_routes, memory::InMemoryServerRepository, runtime::InMemoryProtocolHost,
    },
    domain::ServerDefinition,
    ports::{ServerRepository, ServerRepositoryError},
    services::{LifecycleError, LifecycleOrchestrator},
};
use opcua_fleet::status::{
    adapters::{snapshot::RepositorySnapshotSource, websocket::status_routes},
    domain::HubConfig,
    services::ConnectionHub,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

type StatusHub = ConnectionHub<RepositorySnapshotSource<InMemoryServerRepository>>;

type Orchestrator = LifecycleOrchestrator<
    InMemoryServerRepository,
    InMemoryNodeRepository,
    InMemoryProtocolHost,
    StatusHub,
    DefaultClock,
>;

/// Errors that can stop the daemon.
#[derive(Debug, Error)]
enum FleetError {
    #[error("invalid log filter: {0}")]
    LogFilter(String),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error("failed to read seed file {path}: {source}")]
    SeedRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file: {0}")]
    SeedParse(#[source] serde_json::Error),
    #[error("seed server rejected: {0}")]
    SeedServer(#[source] ServerRepositoryError),
    #[error("seed node rejected: {0}")]
    SeedNode(#[source] NodeValueServiceError),
    #[error("recovery sweep failed: {0}")]
    Recovery(#[source] LifecycleError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Command-line and environment configuration.
#[derive(Debug, Parser)]
#[command(name = "opcua-fleetd", version, about)]
struct Args {
    /// Address the HTTP and WebSocket listener binds to.
    #[arg(long, env = "FLEET_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// JSON file with servers and nodes to load at boot.
    #[arg(long, env = "FLEET_SEED")]
    seed: Option<PathBuf>,
    /// Largest number of simultaneous status subscribers.
    #[arg(long, default_value_t = 100)]
    max_connections: usize,
    /// Silence after which a status subscriber is evicted.
    #[arg(long, default_value_t = 20_000)]
    heartbeat_timeout_ms: u64,
    /// Tracing filter directive, such as `info` or `opcua_fleet=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_filter: String,
}

impl Args {
    fn hub_config(&self) -> HubConfig {
        HubConfig {
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            ..HubConfig::with_max_connections(self.max_connections)
        }
    }
}

/// Servers and nodes loaded at boot.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Seed {
    servers: Vec<ServerDefinition>,
    nodes: Vec<NodeSpec>,
}

fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    init_tracing(&args.log_filter)?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(FleetError::RuntimeInit)?;
    runtime.block_on(run(args))?;
    Ok(())
}

fn init_tracing(filter: &str) -> Result<(), FleetError> {
    let env_filter =
        EnvFilter::try_new(filter).map_err(|err| FleetError::LogFilter(err.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|err| FleetError::LogFilter(err.to_string()))
}

async fn run(args: Args) -> Result<(), FleetError> {
    let servers = Arc::new(InMemoryServerRepository::new());
    let nodes = Arc::new(InMemoryNodeRepository::new());
    if let Some(path) = &args.seed {
        let seed = read_seed(path)?;
        apply_seed(seed, &servers, &nodes).await?;
    }

    let hub = ConnectionHub::new(
        args.hub_config(),
        Arc::new(RepositorySnapshotSource::new(Arc::clone(&servers))),
    );
    let orchestrator: Orchestrator = LifecycleOrchestrator::new(
        servers,
        nodes,
        Arc::new(InMemoryProtocolHost::new()),
        Arc::new(hub.clone()),
        Arc::new(DefaultClock),
    );
    orchestrator.recover().await.map_err(FleetError::Recovery)?;

    let app = fleet_router(orchestrator.clone(), hub.clone());
    let listener = TcpListener::bind(args.listen)
        .await
        .map_err(|source| FleetError::Bind {
            address: args.listen,
            source,
        })?;
    info!(address = %args.listen, "fleet daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            orchestrator.shutdown().await;
            hub.shutdown();
        })
        .await
        .map_err(FleetError::Serve)?;
    info!("fleet daemon stopped");
    Ok(())
}

fn fleet_router(orchestrator: Orchestrator, hub: StatusHub) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(lifecycle_routes(orchestrator))
        .merge(status_routes(hub))
}

fn read_seed(path: &Path) -> Result<Seed, FleetError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FleetError::SeedRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(FleetError::SeedParse)
}

async fn apply_seed(
    seed: Seed,
    servers: &Arc<InMemoryServerRepository>,
    nodes: &Arc<InMemoryNodeRepository>,
) -> Result<(), FleetError> {
    for definition in seed.servers {
        let server = servers
            .create(definition)
            .await
            .map_err(FleetError::SeedServer)?;
        info!(server_id = %server.id(), name = %server.name(), port = %server.port(), "seeded server");
    }

    let service = NodeValueService::new(Arc::clone(nodes), Arc::new(ValueChangeEngine::new()));
    let mut created = 0;
    for spec in &seed.nodes {
        created += service
            .create_batch(spec)
            .await
            .map_err(FleetError::SeedNode)?
            .len();
    }
    info!(nodes = created, "seed applied");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
