/// Time source used for heartbeats.
pub mod clock;
/// Device and role domain types.
pub mod device;
/// Sockets attached to this process.
pub mod hub;
/// Persisted role assignment.
pub mod roles;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    config::AppConfig,
    dao::presence_store::PresenceStore,
    services::{
        delivery::DeliveryChannel, presence_registry::PresenceRegistry,
        role_election::RoleElection,
    },
};

use self::{clock::Clock, hub::SocketHub};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the coordination store handle, the coordinator built
/// on top of it and the sockets attached to this process.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn PresenceStore>,
    store_kind: &'static str,
    election: RoleElection,
    sockets: SocketHub,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// `store_kind` is a short backend label reported by the health endpoint.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn PresenceStore>,
        store_kind: &'static str,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        let registry = PresenceRegistry::new(store.clone(), clock);
        let election = RoleElection::new(store.clone(), registry, config.election().clone());
        Arc::new(Self {
            config,
            store,
            store_kind,
            election,
            sockets: SocketHub::new(),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Coordination store handle.
    pub fn store(&self) -> &Arc<dyn PresenceStore> {
        &self.store
    }

    /// Backend label of the coordination store (`redis` or `memory`).
    pub fn store_kind(&self) -> &'static str {
        self.store_kind
    }

    /// Role election engine.
    pub fn election(&self) -> &RoleElection {
        &self.election
    }

    /// Presence registry shared with the election engine.
    pub fn registry(&self) -> &PresenceRegistry {
        self.election.registry()
    }

    /// Sockets attached to this process.
    pub fn sockets(&self) -> &SocketHub {
        &self.sockets
    }

    /// Channel used to reach connected devices.
    pub fn delivery(&self) -> &dyn DeliveryChannel {
        &self.sockets
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
