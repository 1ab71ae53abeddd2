//! Server descriptor aggregate and its lifecycle state machine.

use super::{ParseServerStatusError, Port, ServerDomainError, ServerId, ServerName};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a protocol server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Server is not running.
    #[default]
    Stopped,
    /// Server is being provisioned and bound.
    Starting,
    /// Server is bound and serving its nodes.
    Running,
    /// The last start or stop failed.
    Error,
}

impl ServerStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error => "error",
        }
    }

    /// Returns whether transition to `target` is allowed.
    ///
    /// `Stopped -> Stopped` is accepted so that stopping an idle server can
    /// reassert its state.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Stopped | Self::Error, Self::Starting | Self::Stopped)
                | (Self::Starting, Self::Running | Self::Error)
                | (Self::Running, Self::Stopped | Self::Error)
        )
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServerStatus {
    type Error = ParseServerStatusError;

    fn try_from(value: &str) -> Result<Self, ParseServerStatusError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "stopped" => Ok(Self::Stopped),
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "error" => Ok(Self::Error),
            _ => Err(ParseServerStatusError(value.to_owned())),
        }
    }
}

/// Endpoint URI a server on `port` is reachable at.
#[must_use]
pub fn endpoint_for(port: Port) -> String {
    format!("opc.tcp://0.0.0.0:{port}/freeopcua/server/")
}

/// Namespace URI registered for a server.
#[must_use]
pub fn namespace_uri_for(name: &ServerName) -> String {
    format!("urn:{name}")
}

/// Input for registering a new server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Display name, also used to derive the namespace URI.
    pub name: ServerName,
    /// Port the server binds.
    pub port: Port,
}

impl ServerDefinition {
    /// Creates a server definition.
    #[must_use]
    pub const fn new(name: ServerName, port: Port) -> Self {
        Self { name, port }
    }
}

/// Status columns written back to persistence after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatusUpdate {
    /// New status.
    pub status: ServerStatus,
    /// Endpoint, present only while running.
    pub endpoint: Option<String>,
    /// Timestamp of the latest start attempt.
    pub last_started: Option<DateTime<Utc>>,
    /// Accumulated running time.
    pub uptime_seconds: u64,
}

/// Parameter object for reconstructing persisted server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedServerData {
    /// Persisted server identifier.
    pub id: ServerId,
    /// Persisted definition.
    pub definition: ServerDefinition,
    /// Persisted status columns.
    pub status: ServerStatusUpdate,
}

/// Persisted protocol server.
///
/// `endpoint` is `Some` exactly when the status is [`ServerStatus::Running`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    id: ServerId,
    name: ServerName,
    port: Port,
    endpoint: Option<String>,
    status: ServerStatus,
    last_started: Option<DateTime<Utc>>,
    uptime_seconds: u64,
}

impl ServerDescriptor {
    /// Creates a stopped server from its definition.
    #[must_use]
    pub fn new(id: ServerId, definition: ServerDefinition) -> Self {
        Self {
            id,
            name: definition.name,
            port: definition.port,
            endpoint: None,
            status: ServerStatus::Stopped,
            last_started: None,
            uptime_seconds: 0,
        }
    }

    /// Reconstructs a server from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedServerData) -> Self {
        let mut server = Self::new(data.id, data.definition);
        server.apply(data.status);
        server
    }

    /// Returns the server identifier.
    #[must_use]
    pub const fn id(&self) -> ServerId {
        self.id
    }

    /// Returns the validated name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns the configured port.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// Returns the endpoint while running.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> ServerStatus {
        self.status
    }

    /// Returns the timestamp of the latest start attempt.
    #[must_use]
    pub const fn last_started(&self) -> Option<DateTime<Utc>> {
        self.last_started
    }

    /// Returns the accumulated running time in seconds.
    #[must_use]
    pub const fn uptime_seconds(&self) -> u64 {
        self.uptime_seconds
    }

    /// Returns the status columns for persistence.
    #[must_use]
    pub fn status_update(&self) -> ServerStatusUpdate {
        ServerStatusUpdate {
            status: self.status,
            endpoint: self.endpoint.clone(),
            last_started: self.last_started,
            uptime_seconds: self.uptime_seconds,
        }
    }

    /// Overwrites the status columns with persisted values.
    pub fn apply(&mut self, update: ServerStatusUpdate) {
        self.status = update.status;
        self.endpoint = update.endpoint;
        self.last_started = update.last_started;
        self.uptime_seconds = update.uptime_seconds;
    }

    /// Marks the server as starting and records the start time.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStatusTransition`] unless the
    /// server is stopped or failed.
    pub fn begin_start(&mut self, clock: &impl Clock) -> Result<(), ServerDomainError> {
        self.transition_to(ServerStatus::Starting)?;
        self.endpoint = None;
        self.last_started = Some(clock.utc());
        Ok(())
    }

    /// Marks the server as running on `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStatusTransition`] unless the
    /// server is starting.
    pub fn mark_running(&mut self, endpoint: String) -> Result<(), ServerDomainError> {
        self.transition_to(ServerStatus::Running)?;
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Marks a start or stop as failed.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStatusTransition`] unless the
    /// server is starting or running.
    pub fn mark_error(&mut self) -> Result<(), ServerDomainError> {
        self.transition_to(ServerStatus::Error)?;
        self.endpoint = None;
        Ok(())
    }

    /// Marks the server as stopped, adding the elapsed run to the uptime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerDomainError::InvalidStatusTransition`] when the server
    /// is still starting.
    pub fn mark_stopped(&mut self, clock: &impl Clock) -> Result<(), ServerDomainError> {
        let was_running = self.status == ServerStatus::Running;
        self.transition_to(ServerStatus::Stopped)?;
        if was_running {
            self.accumulate_uptime(clock.utc());
        }
        self.endpoint = None;
        Ok(())
    }

    /// Forces the server to stopped regardless of its current status.
    ///
    /// Used by the boot and shutdown sweeps, where the persisted status no
    /// longer reflects a live instance. Uptime is not accumulated.
    pub fn force_stopped(&mut self) {
        self.status = ServerStatus::Stopped;
        self.endpoint = None;
    }

    fn accumulate_uptime(&mut self, now: DateTime<Utc>) {
        let Some(started) = self.last_started else {
            return;
        };
        let elapsed = u64::try_from(now.signed_duration_since(started).num_seconds()).unwrap_or(0);
        self.uptime_seconds = self.uptime_seconds.saturating_add(elapsed);
    }

    fn transition_to(&mut self, target: ServerStatus) -> Result<(), ServerDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(ServerDomainError::InvalidStatusTransition {
                from: self.status.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }

        self.status = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use mockable::DefaultClock;
    use rstest::rstest;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<chrono::Local> {
            self.0.with_timezone(&chrono::Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn build_server() -> ServerDescriptor {
        let name = ServerName::new("Boiler House").expect("valid server name");
        let port = Port::new(4840).expect("valid port");
        ServerDescriptor::new(ServerId::new(1), ServerDefinition::new(name, port))
    }

    #[rstest]
    #[case(ServerStatus::Stopped, ServerStatus::Starting, true)]
    #[case(ServerStatus::Stopped, ServerStatus::Stopped, true)]
    #[case(ServerStatus::Stopped, ServerStatus::Running, false)]
    #[case(ServerStatus::Starting, ServerStatus::Running, true)]
    #[case(ServerStatus::Starting, ServerStatus::Error, true)]
    #[case(ServerStatus::Starting, ServerStatus::Stopped, false)]
    #[case(ServerStatus::Running, ServerStatus::Stopped, true)]
    #[case(ServerStatus::Running, ServerStatus::Error, true)]
    #[case(ServerStatus::Running, ServerStatus::Starting, false)]
    #[case(ServerStatus::Error, ServerStatus::Stopped, true)]
    #[case(ServerStatus::Error, ServerStatus::Starting, true)]
    #[case(ServerStatus::Error, ServerStatus::Running, false)]
    fn status_transition_matrix(
        #[case] current: ServerStatus,
        #[case] target: ServerStatus,
        #[case] expected: bool,
    ) {
        assert_eq!(current.can_transition_to(target), expected);
    }

    #[test]
    fn new_servers_are_stopped_without_endpoint() {
        let server = build_server();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.endpoint(), None);
        assert_eq!(server.uptime_seconds(), 0);
    }

    #[test]
    fn endpoint_exists_only_while_running() {
        let clock = DefaultClock;
        let mut server = build_server();
        server.begin_start(&clock).expect("start should begin");
        assert_eq!(server.endpoint(), None);
        assert!(server.last_started().is_some());

        server
            .mark_running(endpoint_for(server.port()))
            .expect("server should run");
        assert_eq!(
            server.endpoint(),
            Some("opc.tcp://0.0.0.0:4840/freeopcua/server/")
        );

        server.mark_error().expect("running server may fail");
        assert_eq!(server.endpoint(), None);
    }

    #[test]
    fn stopping_a_running_server_accumulates_uptime() {
        let started = Utc
            .with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp");
        let mut server = build_server();
        server
            .begin_start(&FixedClock(started))
            .expect("start should begin");
        server
            .mark_running(endpoint_for(server.port()))
            .expect("server should run");

        server
            .mark_stopped(&FixedClock(started + Duration::seconds(90)))
            .expect("server should stop");

        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.uptime_seconds(), 90);
        assert_eq!(server.endpoint(), None);
    }

    #[test]
    fn stopping_an_idle_server_keeps_uptime() {
        let clock = DefaultClock;
        let mut server = build_server();
        server.mark_stopped(&clock).expect("stop should be idempotent");
        assert_eq!(server.uptime_seconds(), 0);
    }

    #[test]
    fn starting_server_cannot_be_stopped_directly() {
        let clock = DefaultClock;
        let mut server = build_server();
        server.begin_start(&clock).expect("start should begin");
        assert_eq!(
            server.mark_stopped(&clock),
            Err(ServerDomainError::InvalidStatusTransition {
                from: "starting".to_owned(),
                to: "stopped".to_owned(),
            })
        );

        server.force_stopped();
        assert_eq!(server.status(), ServerStatus::Stopped);
    }

    #[test]
    fn namespace_uses_server_name() {
        let server = build_server();
        assert_eq!(namespace_uri_for(server.name()), "urn:Boiler House");
    }

    #[rstest]
    #[case("RUNNING", Ok(ServerStatus::Running))]
    #[case(" stopped ", Ok(ServerStatus::Stopped))]
    #[case("error", Ok(ServerStatus::Error))]
    #[case("paused", Err(ParseServerStatusError("paused".to_owned())))]
    fn status_parses_from_storage(
        #[case] raw: &str,
        #[case] expected: Result<ServerStatus, ParseServerStatusError>,
    ) {
        assert_eq!(ServerStatus::try_from(raw), expected);
    }
}
