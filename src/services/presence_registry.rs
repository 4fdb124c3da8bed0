use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    dao::{
        keys,
        models::{self, FIELD_CONNECTED_AT, FIELD_LAST_HEARTBEAT, FIELD_SOCKET_ID},
        presence_store::PresenceStore,
    },
    error::ServiceError,
    state::{
        clock::Clock,
        device::{Device, DeviceMetadata},
    },
};

/// Tracks which devices are registered for each user and when they were last heard from.
///
/// Holds no state of its own: everything lives in the coordination store so any
/// process instance can serve any of a user's connections.
#[derive(Clone)]
pub struct PresenceRegistry {
    store: Arc<dyn PresenceStore>,
    clock: Arc<dyn Clock>,
}

impl PresenceRegistry {
    /// Build a registry over `store`, timestamping with `clock`.
    pub fn new(store: Arc<dyn PresenceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register (or re-register) a device bound to `socket_id`.
    ///
    /// Upserts the record in place: `connected_at` survives re-registration while the
    /// socket and heartbeat are refreshed. Does not trigger an election.
    pub async fn register_device(
        &self,
        user_id: &str,
        metadata: DeviceMetadata,
        socket_id: &str,
    ) -> Result<Device, ServiceError> {
        let now = self.clock.now_ms();
        let device_key = keys::user_device(user_id, &metadata.device_id);

        self.store
            .set_add(keys::user_devices(user_id), metadata.device_id.clone())
            .await?;

        let mut device = Device {
            device_id: metadata.device_id,
            device_type: metadata.device_type,
            can_play: metadata.can_play,
            preferred_role: metadata.preferred_role,
            socket_id: socket_id.to_string(),
            connected_at: now,
            last_heartbeat: now,
        };
        self.store
            .hash_set(device_key.clone(), models::device_fields(&device))
            .await?;
        let first_seen = self
            .store
            .hash_set_if_absent(
                device_key.clone(),
                FIELD_CONNECTED_AT.to_string(),
                now.to_string(),
            )
            .await?;
        if !first_seen {
            if let Some(connected_at) = self
                .store
                .hash_get(device_key, FIELD_CONNECTED_AT.to_string())
                .await?
                .and_then(|raw| raw.parse().ok())
            {
                device.connected_at = connected_at;
            }
        }

        self.store
            .set(keys::socket_device(socket_id), device.device_id.clone())
            .await?;
        self.store
            .sorted_set_add(keys::user_heartbeats(user_id), device.device_id.clone(), now)
            .await?;

        debug!(
            user_id,
            device_id = %device.device_id,
            socket_id,
            first_seen,
            "device registered"
        );
        Ok(device)
    }

    /// Refresh the heartbeat of a registered device.
    ///
    /// Returns `false` without touching anything when the device is unknown, e.g. a
    /// heartbeat racing a disconnect.
    pub async fn update_heartbeat(&self, user_id: &str, device_id: &str) -> Result<bool, ServiceError> {
        let now = self.clock.now_ms();
        let updated = self
            .store
            .hash_update_existing(
                keys::user_device(user_id, device_id),
                FIELD_LAST_HEARTBEAT.to_string(),
                now.to_string(),
            )
            .await?;

        if updated {
            self.store
                .sorted_set_add(keys::user_heartbeats(user_id), device_id.to_string(), now)
                .await?;
        } else {
            debug!(user_id, device_id, "heartbeat for unknown device ignored");
        }
        Ok(updated)
    }

    /// Forget the device bound to `socket_id`, returning its id when one was removed.
    ///
    /// When the device already re-registered on another socket only the stale reverse
    /// mapping is dropped, so a late close cannot evict a live reconnection.
    pub async fn remove_device_by_socket(
        &self,
        user_id: &str,
        socket_id: &str,
    ) -> Result<Option<String>, ServiceError> {
        let socket_key = keys::socket_device(socket_id);
        let Some(device_id) = self.store.get(socket_key.clone()).await? else {
            return Ok(None);
        };

        let bound_socket = self
            .store
            .hash_get(
                keys::user_device(user_id, &device_id),
                FIELD_SOCKET_ID.to_string(),
            )
            .await?;

        let removed = match bound_socket.as_deref() {
            Some(current) if current != socket_id => {
                debug!(
                    user_id,
                    device_id = %device_id,
                    socket_id,
                    current_socket_id = current,
                    "device moved to another socket; keeping registration"
                );
                None
            }
            _ => {
                self.remove_device(user_id, &device_id).await?;
                Some(device_id)
            }
        };

        self.store.delete(socket_key).await?;
        Ok(removed)
    }

    /// Remove a device from the user's set, its record and its heartbeat entry.
    pub async fn remove_device(&self, user_id: &str, device_id: &str) -> Result<(), ServiceError> {
        self.store
            .set_remove(keys::user_devices(user_id), device_id.to_string())
            .await?;
        self.store
            .delete(keys::user_device(user_id, device_id))
            .await?;
        self.store
            .sorted_set_remove(keys::user_heartbeats(user_id), device_id.to_string())
            .await?;
        debug!(user_id, device_id, "device removed");
        Ok(())
    }

    /// Read one device record, `None` when it is not registered or unreadable.
    pub async fn get_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, ServiceError> {
        let fields = self
            .store
            .hash_get_all(keys::user_device(user_id, device_id))
            .await?;
        if fields.is_empty() {
            return Ok(None);
        }
        match models::device_from_fields(&fields) {
            Ok(device) => Ok(Some(device)),
            Err(err) => {
                warn!(user_id, device_id, error = %err, "skipping unreadable device record");
                Ok(None)
            }
        }
    }

    /// Registered devices whose last heartbeat is within `stale_ms` of `now`.
    ///
    /// Stale devices stay registered; they are only left out of the result.
    pub async fn list_active_devices(
        &self,
        user_id: &str,
        now: u64,
        stale_ms: u64,
    ) -> Result<Vec<Device>, ServiceError> {
        let candidates = self
            .store
            .sorted_set_range_by_score(
                keys::user_heartbeats(user_id),
                now.saturating_sub(stale_ms),
                u64::MAX,
            )
            .await?;

        let mut devices = Vec::with_capacity(candidates.len());
        for device_id in candidates {
            match self.get_device(user_id, &device_id).await? {
                Some(device) if device.is_active(now, stale_ms) => devices.push(device),
                Some(_) => {}
                None => debug!(user_id, device_id = %device_id, "heartbeat entry without record"),
            }
        }
        Ok(devices)
    }

    /// Current time according to the registry clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
