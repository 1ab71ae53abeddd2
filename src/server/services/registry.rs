//! In-process table of live protocol server instances.
//!
//! Each identifier is in one of three states: absent, claimed by an
//! in-flight start or stop, or running with its handle installed. The
//! claim is taken atomically, so at most one lifecycle operation runs per
//! identifier at a time.

use crate::server::domain::ServerId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Live protocol server instance owned by the registry.
#[derive(Debug)]
pub struct RuntimeServerHandle<S> {
    server_id: ServerId,
    endpoint: String,
    started_at: DateTime<Utc>,
    instance: S,
}

impl<S> RuntimeServerHandle<S> {
    /// Wraps a started instance.
    #[must_use]
    pub const fn new(
        server_id: ServerId,
        endpoint: String,
        started_at: DateTime<Utc>,
        instance: S,
    ) -> Self {
        Self {
            server_id,
            endpoint,
            started_at,
            instance,
        }
    }

    /// Returns the owning server's identifier.
    #[must_use]
    pub const fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Returns the bound endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns when the instance was started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the instance for shutdown.
    #[must_use]
    pub fn into_instance(self) -> S {
        self.instance
    }
}

/// Result of claiming a running server for shutdown.
#[derive(Debug)]
pub enum StopClaim<S> {
    /// Nothing is registered for the identifier.
    NotRegistered,
    /// Another start or stop holds the identifier.
    InProgress,
    /// The handle was taken out; the identifier stays claimed until
    /// [`ServerRegistry::release`].
    Claimed(RuntimeServerHandle<S>),
}

#[derive(Debug)]
enum Slot<S> {
    Claimed,
    Running(RuntimeServerHandle<S>),
}

/// Runtime registry of protocol server instances keyed by server identifier.
#[derive(Debug)]
pub struct ServerRegistry<S> {
    slots: Mutex<HashMap<ServerId, Slot<S>>>,
}

impl<S> Default for ServerRegistry<S> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> ServerRegistry<S> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ServerId, Slot<S>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `id` for starting.
    ///
    /// Returns `false` when the identifier is already claimed or running.
    #[must_use]
    pub fn try_acquire(&self, id: ServerId) -> bool {
        match self.slots().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Slot::Claimed);
                true
            }
        }
    }

    /// Stores the handle of a started instance under its identifier.
    pub fn install(&self, handle: RuntimeServerHandle<S>) {
        self.slots()
            .insert(handle.server_id(), Slot::Running(handle));
    }

    /// Drops a claim taken by [`Self::try_acquire`] or
    /// [`Self::take_for_stop`].
    ///
    /// Running entries are left untouched.
    pub fn release(&self, id: ServerId) {
        let mut slots = self.slots();
        if matches!(slots.get(&id), Some(Slot::Claimed)) {
            slots.remove(&id);
        }
    }

    /// Removes and returns a running handle.
    #[must_use]
    pub fn remove(&self, id: ServerId) -> Option<RuntimeServerHandle<S>> {
        let mut slots = self.slots();
        if !matches!(slots.get(&id), Some(Slot::Running(_))) {
            return None;
        }
        match slots.remove(&id) {
            Some(Slot::Running(handle)) => Some(handle),
            _ => None,
        }
    }

    /// Takes a running handle out for shutdown and leaves `id` claimed.
    #[must_use]
    pub fn take_for_stop(&self, id: ServerId) -> StopClaim<S> {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&id) else {
            return StopClaim::NotRegistered;
        };
        match std::mem::replace(slot, Slot::Claimed) {
            Slot::Claimed => StopClaim::InProgress,
            Slot::Running(handle) => StopClaim::Claimed(handle),
        }
    }

    /// Returns whether a live instance is installed for `id`.
    #[must_use]
    pub fn is_running(&self, id: ServerId) -> bool {
        matches!(self.slots().get(&id), Some(Slot::Running(_)))
    }

    /// Returns the identifiers of all running instances in ascending order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self
            .slots()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Running(_)))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> ServerRegistry<&'static str> {
        ServerRegistry::new()
    }

    fn handle(id: i64) -> RuntimeServerHandle<&'static str> {
        RuntimeServerHandle::new(
            ServerId::new(id),
            format!("opc.tcp://0.0.0.0:{}/freeopcua/server/", 4840 + id),
            Utc::now(),
            "instance",
        )
    }

    #[rstest]
    fn acquire_is_exclusive(registry: ServerRegistry<&'static str>) {
        let id = ServerId::new(1);
        assert!(registry.try_acquire(id));
        assert!(!registry.try_acquire(id));
        assert!(registry.try_acquire(ServerId::new(2)));
    }

    #[rstest]
    fn claims_are_not_running(registry: ServerRegistry<&'static str>) {
        let id = ServerId::new(1);
        assert!(registry.try_acquire(id));
        assert!(!registry.is_running(id));
        assert!(registry.snapshot().is_empty());
        assert!(registry.remove(id).is_none());
    }

    #[rstest]
    fn released_claims_can_be_acquired_again(registry: ServerRegistry<&'static str>) {
        let id = ServerId::new(1);
        assert!(registry.try_acquire(id));
        registry.release(id);
        assert!(registry.try_acquire(id));
    }

    #[rstest]
    fn install_then_remove(registry: ServerRegistry<&'static str>) {
        let id = ServerId::new(3);
        assert!(registry.try_acquire(id));
        registry.install(handle(3));

        registry.release(id);
        assert!(registry.is_running(id));
        assert!(!registry.try_acquire(id));
        assert_eq!(registry.snapshot(), vec![id]);

        let removed = registry.remove(id).expect("handle should be installed");
        assert_eq!(removed.server_id(), id);
        assert!(registry.snapshot().is_empty());
    }

    #[rstest]
    fn stop_claim_blocks_starts_until_released(registry: ServerRegistry<&'static str>) {
        let id = ServerId::new(4);
        assert!(registry.try_acquire(id));
        registry.install(handle(4));

        assert!(matches!(registry.take_for_stop(id), StopClaim::Claimed(_)));
        assert!(matches!(registry.take_for_stop(id), StopClaim::InProgress));
        assert!(!registry.try_acquire(id));
        assert!(registry.snapshot().is_empty());

        registry.release(id);
        assert!(matches!(
            registry.take_for_stop(id),
            StopClaim::NotRegistered
        ));
    }

    #[rstest]
    fn snapshot_is_sorted(registry: ServerRegistry<&'static str>) {
        for id in [5, 2, 9] {
            registry.install(handle(id));
        }
        assert_eq!(
            registry.snapshot(),
            vec![ServerId::new(2), ServerId::new(5), ServerId::new(9)]
        );
    }
}
