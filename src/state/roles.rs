use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::device::Role;

/// Per-user election result, persisted as JSON under `user:{id}:roles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolesState {
    /// Bumped on every committed change of the assignment.
    pub version: u64,
    /// Device that renders playback, if any device is active.
    pub player_device_id: Option<String>,
    /// Device that controls playback; the player itself when it is alone.
    pub remote_device_id: Option<String>,
}

impl RolesState {
    /// State reported when nothing was ever elected (or the stored value is unreadable).
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether `other` names the same player and remote, regardless of version.
    pub fn same_assignment(&self, other: &RolesState) -> bool {
        self.player_device_id == other.player_device_id
            && self.remote_device_id == other.remote_device_id
    }

    /// Roles currently held by `device_id` (both for a self-remote device).
    pub fn roles_of(&self, device_id: &str) -> Vec<Role> {
        let mut roles = Vec::with_capacity(2);
        if self.player_device_id.as_deref() == Some(device_id) {
            roles.push(Role::Player);
        }
        if self.remote_device_id.as_deref() == Some(device_id) {
            roles.push(Role::Remote);
        }
        roles
    }
}
