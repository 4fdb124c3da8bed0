use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::format_epoch_millis,
    state::{
        device::{Device, DeviceType, Role},
        roles::RolesState,
    },
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Active device as exposed over HTTP.
pub struct DeviceSummary {
    /// Device identifier.
    pub device_id: String,
    /// Form factor of the device.
    pub device_type: DeviceType,
    /// Whether the device can render playback.
    pub can_play: bool,
    /// Informational only; elections ignore it.
    pub preferred_role: Option<Role>,
    /// RFC 3339 first-seen time.
    pub connected_at: String,
    /// RFC 3339 time of the last heartbeat.
    pub last_heartbeat: String,
    /// Roles the device currently holds.
    pub roles: Vec<Role>,
}

impl DeviceSummary {
    /// Describe `device` in the light of the current `roles`.
    pub fn new(device: Device, roles: &RolesState) -> Self {
        Self {
            roles: roles.roles_of(&device.device_id),
            connected_at: format_epoch_millis(device.connected_at),
            last_heartbeat: format_epoch_millis(device.last_heartbeat),
            device_id: device.device_id,
            device_type: device.device_type,
            can_play: device.can_play,
            preferred_role: device.preferred_role,
        }
    }
}
