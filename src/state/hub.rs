use std::collections::BTreeSet;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::state::roles::RolesState;

/// Handle used to push messages to one device connection served by this process.
pub struct SocketConnection {
    /// Owner of the device.
    pub user_id: String,
    /// Device joined on this socket.
    pub device_id: String,
    /// Writer queue of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Last roles pushed to this socket, so the device can render its role.
    pub roles: Option<RolesState>,
}

/// Registry of the device sockets attached to this process, keyed by socket id.
///
/// Purely local bookkeeping for message delivery; presence itself lives in the
/// coordination store.
#[derive(Default)]
pub struct SocketHub {
    sockets: DashMap<String, SocketConnection>,
}

impl SocketHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly joined socket.
    pub fn attach(&self, socket_id: String, connection: SocketConnection) {
        self.sockets.insert(socket_id, connection);
    }

    /// Stop tracking a socket, returning its connection if it was known.
    pub fn detach(&self, socket_id: &str) -> Option<SocketConnection> {
        self.sockets.remove(socket_id).map(|(_, connection)| connection)
    }

    /// Number of sockets attached to this process.
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    /// Whether no socket is attached.
    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Distinct users with at least one local socket.
    pub fn users(&self) -> BTreeSet<String> {
        self.sockets
            .iter()
            .map(|entry| entry.user_id.clone())
            .collect()
    }

    /// Roles last pushed to `socket_id`.
    pub fn roles_of(&self, socket_id: &str) -> Option<RolesState> {
        self.sockets
            .get(socket_id)
            .and_then(|connection| connection.roles.clone())
    }

    /// Clone the sender of `socket_id`, if attached.
    pub fn sender(&self, socket_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        self.sockets
            .get(socket_id)
            .map(|connection| connection.tx.clone())
    }

    /// Record `roles` on every local socket of `user_id` whose stored roles are older
    /// (or unknown), returning the senders that should be notified.
    pub fn record_roles(
        &self,
        user_id: &str,
        roles: &RolesState,
    ) -> Vec<(String, mpsc::UnboundedSender<Message>)> {
        let mut targets = Vec::new();
        for mut entry in self.sockets.iter_mut() {
            if entry.user_id != user_id {
                continue;
            }
            if entry
                .roles
                .as_ref()
                .is_some_and(|known| known.version >= roles.version)
            {
                continue;
            }
            entry.roles = Some(roles.clone());
            targets.push((entry.key().clone(), entry.tx.clone()));
        }
        targets
    }
}
