//! Subscriber registry with admission control, heartbeat eviction, and
//! best-effort broadcast.
//!
//! Each connection owns a bounded outbound queue. Broadcasting only enqueues,
//! so a slow or dead subscriber never delays the others: a full or closed
//! queue evicts that connection alone. Until a new connection's snapshot is
//! queued, broadcasts to it are held back and follow the snapshot. The
//! eviction sweep is one task per hub, spawned on the first connection and
//! stopped by [`ConnectionHub::shutdown`].

use crate::server::{domain::ServerStatusEvent, ports::StatusPublisher};
use crate::status::{
    domain::{
        CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, ClientCommand, ConnectionId, HubConfig, HubError,
        HubFrame, PONG, StatusMessage,
    },
    ports::StatusSnapshotSource,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receiving side of an admitted connection.
#[derive(Debug)]
pub struct Subscription {
    id: ConnectionId,
    frames: mpsc::Receiver<HubFrame>,
}

impl Subscription {
    /// Returns the connection handle.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next queued frame.
    ///
    /// Returns `None` once the connection was removed from the hub.
    pub async fn recv(&mut self) -> Option<HubFrame> {
        self.frames.recv().await
    }

    /// Splits the subscription into its handle and frame queue.
    #[must_use]
    pub fn into_parts(self) -> (ConnectionId, mpsc::Receiver<HubFrame>) {
        (self.id, self.frames)
    }
}

#[derive(Debug)]
struct Connection {
    sender: mpsc::Sender<HubFrame>,
    last_heartbeat: Instant,
    /// Frames broadcast before the initial snapshot was queued.
    backlog: Option<Vec<HubFrame>>,
}

struct HubInner<S> {
    config: HubConfig,
    snapshots: Arc<S>,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    sweeper_started: AtomicBool,
    shutdown: CancellationToken,
}

impl<S> HubInner<S> {
    fn connections(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep(&self) -> usize {
        let timeout = self.config.heartbeat_timeout;
        let now = Instant::now();
        let mut connections = self.connections();
        let expired: Vec<ConnectionId> = connections
            .iter()
            .filter(|(_, connection)| now.duration_since(connection.last_heartbeat) > timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(connection) = connections.remove(id) {
                warn!(connection_id = %id, "evicting connection after heartbeat timeout");
                if connection
                    .sender
                    .try_send(HubFrame::close(CLOSE_GOING_AWAY, "heartbeat timeout"))
                    .is_err()
                {
                    debug!(connection_id = %id, "close frame not delivered");
                }
            }
        }
        debug!(
            evicted = expired.len(),
            active = connections.len(),
            "heartbeat sweep complete"
        );
        expired.len()
    }
}

/// Fan-out hub for server status events.
pub struct ConnectionHub<S> {
    inner: Arc<HubInner<S>>,
}

impl<S> Clone for ConnectionHub<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> ConnectionHub<S>
where
    S: StatusSnapshotSource + 'static,
{
    /// Creates a hub with no connections.
    #[must_use]
    pub fn new(config: HubConfig, snapshots: Arc<S>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                snapshots,
                connections: Mutex::new(HashMap::new()),
                sweeper_started: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Returns the hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections().len()
    }

    /// Returns whether `id` is an active connection.
    #[must_use]
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.inner.connections().contains_key(&id)
    }

    /// Admits a new subscriber and queues the full status snapshot as its
    /// first frame.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AdmissionRejected`] at the connection ceiling, and
    /// [`HubError::Snapshot`] when the snapshot cannot be built, in which case
    /// the connection is closed again.
    pub async fn connect(&self) -> Result<Subscription, HubError> {
        let id = ConnectionId::new();
        let (sender, frames) = mpsc::channel(self.inner.config.outbound_buffer.max(1));
        {
            let mut connections = self.inner.connections();
            let limit = self.inner.config.max_connections;
            if connections.len() >= limit {
                warn!(limit, "connection rejected: limit reached");
                return Err(HubError::AdmissionRejected { limit });
            }
            connections.insert(
                id,
                Connection {
                    sender,
                    last_heartbeat: Instant::now(),
                    backlog: Some(Vec::new()),
                },
            );
            info!(connection_id = %id, active = connections.len(), "connection accepted");
        }
        self.ensure_sweeper();

        if let Err(err) = self.send_snapshot(id).await {
            error!(connection_id = %id, error = %err, "cannot send initial status");
            self.close(id, HubFrame::close(CLOSE_INTERNAL_ERROR, "status unavailable"));
            return Err(err);
        }
        Ok(Subscription { id, frames })
    }

    /// Removes a connection; unknown handles are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut connections = self.inner.connections();
        if connections.remove(&id).is_some() {
            info!(connection_id = %id, active = connections.len(), "connection closed");
        }
    }

    /// Handles one text frame from a subscriber.
    ///
    /// `ping` refreshes the heartbeat and queues [`PONG`];
    /// `get_initial_status` queues a fresh snapshot. Other text is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownConnection`] once the connection was
    /// evicted, and [`HubError::Snapshot`] when a requested snapshot cannot
    /// be built.
    pub async fn handle_text(&self, id: ConnectionId, text: &str) -> Result<(), HubError> {
        match ClientCommand::parse(text) {
            Some(ClientCommand::Ping) => {
                self.touch(id)?;
                debug!(connection_id = %id, "heartbeat received");
                self.send_to(id, HubFrame::Text(PONG.to_owned()))
            }
            Some(ClientCommand::GetInitialStatus) => self.send_snapshot(id).await,
            None => {
                debug!(connection_id = %id, "ignoring unknown client message");
                if self.is_connected(id) {
                    Ok(())
                } else {
                    Err(HubError::UnknownConnection(id))
                }
            }
        }
    }

    /// Sends `event` to every active connection.
    ///
    /// Connections whose queue is full or closed are evicted; delivery to
    /// the rest is unaffected. Returns the number of connections reached.
    pub fn broadcast(&self, event: &ServerStatusEvent) -> usize {
        let text = match StatusMessage::ServerStatus(event.clone()).to_json() {
            Ok(text) => text,
            Err(err) => {
                error!(server_id = %event.id, error = %err, "cannot serialise status event");
                return 0;
            }
        };

        // The snapshot takes one queue slot ahead of the held frames.
        let held_limit = self.inner.config.outbound_buffer.saturating_sub(1);
        let mut connections = self.inner.connections();
        let mut failed = Vec::new();
        for (id, connection) in connections.iter_mut() {
            let frame = HubFrame::Text(text.clone());
            let queued = match connection.backlog.as_mut() {
                Some(backlog) if backlog.len() < held_limit => {
                    backlog.push(frame);
                    true
                }
                Some(_) => false,
                None => connection.sender.try_send(frame).is_ok(),
            };
            if !queued {
                failed.push(*id);
            }
        }
        for id in &failed {
            connections.remove(id);
            warn!(connection_id = %id, "evicting connection after failed send");
        }
        let delivered = connections.len();
        info!(
            server_id = %event.id,
            status = %event.status,
            delivered,
            evicted = failed.len(),
            "status broadcast"
        );
        delivered
    }

    /// Evicts every connection whose last heartbeat is older than the
    /// configured timeout. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Stops the sweep task and closes every connection.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let drained: Vec<(ConnectionId, Connection)> = self.inner.connections().drain().collect();
        for (id, connection) in drained {
            if connection
                .sender
                .try_send(HubFrame::close(CLOSE_GOING_AWAY, "server shutting down"))
                .is_err()
            {
                debug!(connection_id = %id, "close frame not delivered");
            }
        }
        info!("connection hub shut down");
    }

    fn ensure_sweeper(&self) {
        if self
            .inner
            .sweeper_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let period = self.inner.config.sweep_period();
        let shutdown = self.inner.shutdown.clone();
        let inner: Weak<HubInner<S>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(hub) = inner.upgrade() else {
                            break;
                        };
                        hub.sweep();
                    }
                }
            }
            debug!("heartbeat sweep stopped");
        });
        info!(period_ms = period.as_millis(), "heartbeat sweep started");
    }

    fn touch(&self, id: ConnectionId) -> Result<(), HubError> {
        let mut connections = self.inner.connections();
        let connection = connections
            .get_mut(&id)
            .ok_or(HubError::UnknownConnection(id))?;
        connection.last_heartbeat = Instant::now();
        Ok(())
    }

    fn send_to(&self, id: ConnectionId, frame: HubFrame) -> Result<(), HubError> {
        let mut connections = self.inner.connections();
        let connection = connections
            .get(&id)
            .ok_or(HubError::UnknownConnection(id))?;
        if connection.sender.try_send(frame).is_err() {
            connections.remove(&id);
            warn!(connection_id = %id, "evicting connection after failed send");
            return Err(HubError::UnknownConnection(id));
        }
        Ok(())
    }

    fn close(&self, id: ConnectionId, frame: HubFrame) {
        if let Some(connection) = self.inner.connections().remove(&id) {
            if connection.sender.try_send(frame).is_err() {
                debug!(connection_id = %id, "close frame not delivered");
            }
        }
    }

    async fn send_snapshot(&self, id: ConnectionId) -> Result<(), HubError> {
        let statuses = self
            .inner
            .snapshots
            .current_statuses()
            .await
            .map_err(HubError::snapshot)?;
        let count = statuses.len();
        let text = StatusMessage::InitialStatus(statuses)
            .to_json()
            .map_err(HubError::snapshot)?;
        self.deliver_snapshot(id, HubFrame::Text(text))?;
        debug!(connection_id = %id, servers = count, "initial status sent");
        Ok(())
    }

    fn deliver_snapshot(&self, id: ConnectionId, snapshot: HubFrame) -> Result<(), HubError> {
        let mut connections = self.inner.connections();
        let connection = connections
            .get_mut(&id)
            .ok_or(HubError::UnknownConnection(id))?;
        let held = connection.backlog.take().unwrap_or_default();
        let held_count = held.len();
        let delivered = std::iter::once(snapshot)
            .chain(held)
            .all(|frame| connection.sender.try_send(frame).is_ok());
        if !delivered {
            connections.remove(&id);
            warn!(connection_id = %id, "evicting connection after failed send");
            return Err(HubError::UnknownConnection(id));
        }
        if held_count > 0 {
            debug!(connection_id = %id, held = held_count, "released held status frames");
        }
        Ok(())
    }
}

#[async_trait]
impl<S> StatusPublisher for ConnectionHub<S>
where
    S: StatusSnapshotSource + 'static,
{
    async fn publish(&self, event: &ServerStatusEvent) {
        self.broadcast(event);
    }
}
