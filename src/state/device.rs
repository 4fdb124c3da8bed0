use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Hardware class reported by a client when it joins.
///
/// Unknown strings are accepted and collapse to [`DeviceType::Other`] so newer
/// clients never fail to register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DeviceType {
    /// Hand-held phone.
    Phone,
    /// Tablet.
    Tablet,
    /// Desktop or laptop browser.
    Desktop,
    /// Anything else (smart TV, unknown client, ...).
    #[default]
    Other,
}

impl DeviceType {
    /// Rank used when choosing the player: the bigger the screen, the better.
    pub const fn player_priority(self) -> u8 {
        match self {
            DeviceType::Desktop => 3,
            DeviceType::Tablet => 2,
            DeviceType::Phone => 1,
            DeviceType::Other => 0,
        }
    }

    /// Rank used when choosing the remote: hand-held devices first.
    pub const fn remote_priority(self) -> u8 {
        match self {
            DeviceType::Phone => 3,
            DeviceType::Tablet => 2,
            DeviceType::Desktop => 1,
            DeviceType::Other => 0,
        }
    }

    /// Canonical lowercase name, as stored in the coordination store.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceType::Phone => "phone",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Other => "other",
        }
    }
}

impl From<&str> for DeviceType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "phone" => DeviceType::Phone,
            "tablet" => DeviceType::Tablet,
            "desktop" => DeviceType::Desktop,
            _ => DeviceType::Other,
        }
    }
}

impl From<String> for DeviceType {
    fn from(value: String) -> Self {
        DeviceType::from(value.as_str())
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a device can hold for its user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Renders the content.
    Player,
    /// Issues control commands.
    Remote,
}

impl Role {
    /// Canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Remote => "remote",
        }
    }

    /// Parse a stored role name, returning `None` for anything unknown.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "player" => Some(Role::Player),
            "remote" => Some(Role::Remote),
            _ => None,
        }
    }
}

/// What a client tells us about itself when it joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    /// Stable client-generated identifier, survives reconnects.
    pub device_id: String,
    /// Form factor driving election priority.
    pub device_type: DeviceType,
    /// Whether the device can render video.
    pub can_play: bool,
    /// Advisory hint only; the election never consults it.
    pub preferred_role: Option<Role>,
}

/// A registered device as persisted in the coordination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Stable client-generated identifier.
    pub device_id: String,
    /// Form factor driving election priority.
    pub device_type: DeviceType,
    /// Whether the device can render video.
    pub can_play: bool,
    /// Advisory hint, stored but not used by the election.
    pub preferred_role: Option<Role>,
    /// Transport connection currently bound to the device.
    pub socket_id: String,
    /// First-seen timestamp (ms since epoch), kept across re-registrations.
    pub connected_at: u64,
    /// Most recent liveness timestamp (ms since epoch).
    pub last_heartbeat: u64,
}

impl Device {
    /// Whether the device heartbeat falls within `stale_ms` of `now`.
    pub fn is_active(&self, now: u64, stale_ms: u64) -> bool {
        now.saturating_sub(self.last_heartbeat) <= stale_ms
    }
}
