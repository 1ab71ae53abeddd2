//! HTTP control surface for server lifecycles.
//!
//! `POST /servers/{id}/start` and `POST /servers/{id}/stop` answer with the
//! persisted descriptor as JSON. Lifecycle errors map to status codes in
//! [`LifecycleError`]'s [`IntoResponse`] implementation.

use crate::node::ports::NodeRepository;
use crate::server::{
    domain::{ServerDescriptor, ServerDomainError, ServerId},
    ports::{ProtocolHost, ServerRepository, StatusPublisher},
    services::{LifecycleError, LifecycleOrchestrator, StartOutcome, StopOutcome},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use mockable::Clock;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

#[derive(Debug, Serialize)]
struct StartBody {
    server: ServerDescriptor,
    endpoint: String,
    warnings: Vec<String>,
}

impl From<StartOutcome> for StartBody {
    fn from(outcome: StartOutcome) -> Self {
        Self {
            server: outcome.server,
            endpoint: outcome.endpoint,
            warnings: outcome.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StopBody {
    server: ServerDescriptor,
    was_running: bool,
}

impl From<StopOutcome> for StopBody {
    fn from(outcome: StopOutcome) -> Self {
        Self {
            server: outcome.server,
            was_running: outcome.was_running,
        }
    }
}

impl LifecycleError {
    /// HTTP status reported for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyRunning(_)
            | Self::OperationInProgress(_)
            | Self::Domain(ServerDomainError::PortInUse { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LifecycleError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "lifecycle request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Builds the lifecycle control router.
pub fn lifecycle_routes<R, N, H, P, C>(orchestrator: LifecycleOrchestrator<R, N, H, P, C>) -> Router
where
    R: ServerRepository + 'static,
    N: NodeRepository + 'static,
    H: ProtocolHost + 'static,
    P: StatusPublisher + 'static,
    C: Clock + Send + Sync + 'static,
{
    Router::new()
        .route("/servers/{id}/start", post(start_server::<R, N, H, P, C>))
        .route("/servers/{id}/stop", post(stop_server::<R, N, H, P, C>))
        .with_state(orchestrator)
}

async fn start_server<R, N, H, P, C>(
    State(orchestrator): State<LifecycleOrchestrator<R, N, H, P, C>>,
    Path(id): Path<i64>,
) -> Result<Json<StartBody>, LifecycleError>
where
    R: ServerRepository + 'static,
    N: NodeRepository + 'static,
    H: ProtocolHost + 'static,
    P: StatusPublisher + 'static,
    C: Clock + Send + Sync + 'static,
{
    let outcome = orchestrator.start(ServerId::new(id)).await?;
    Ok(Json(outcome.into()))
}

async fn stop_server<R, N, H, P, C>(
    State(orchestrator): State<LifecycleOrchestrator<R, N, H, P, C>>,
    Path(id): Path<i64>,
) -> Result<Json<StopBody>, LifecycleError>
where
    R: ServerRepository + 'static,
    N: NodeRepository + 'static,
    H: ProtocolHost + 'static,
    P: StatusPublisher + 'static,
    C: Clock + Send + Sync + 'static,
{
    let outcome = orchestrator.stop(ServerId::new(id)).await?;
    Ok(Json(outcome.into()))
}
