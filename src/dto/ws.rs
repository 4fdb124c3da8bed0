use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_identifier,
    state::{
        device::{DeviceMetadata, DeviceType, Role},
        roles::RolesState,
    },
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from device WebSocket clients.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeviceInboundMessage {
    /// Must be the first frame of every connection.
    Join {
        /// Owner of the device.
        #[serde(rename = "userId")]
        user_id: String,
        /// Device joining the user's session.
        device: DeviceDescriptor,
    },
    /// Liveness ping refreshing the device heartbeat.
    Heartbeat,
    /// Control command forwarded verbatim to the elected player.
    Command {
        /// Opaque command body.
        #[schema(value_type = Object)]
        payload: Value,
    },
    /// Graceful disconnect.
    Leave,
    /// Any other `type`; ignored.
    #[serde(other)]
    Unknown,
}

impl DeviceInboundMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Device description carried by the `join` message.
pub struct DeviceDescriptor {
    /// Stable device identifier chosen by the client.
    #[validate(custom(function = "validate_identifier"))]
    pub device_id: String,
    /// Form factor; unknown values read as `other`.
    #[serde(default)]
    pub device_type: DeviceType,
    /// Whether the device can render playback.
    #[serde(default)]
    pub can_play: bool,
    /// Role the user would like this device to hold (informational).
    #[serde(default)]
    pub preferred_role: Option<Role>,
}

impl From<DeviceDescriptor> for DeviceMetadata {
    fn from(value: DeviceDescriptor) -> Self {
        Self {
            device_id: value.device_id,
            device_type: value.device_type,
            can_play: value.can_play,
            preferred_role: value.preferred_role,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to device WebSocket clients.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeviceOutboundMessage {
    /// Current role assignment of the user.
    RolesUpdated {
        /// Assignment after the latest committed election.
        roles: RolesState,
    },
    /// Command relayed from the remote to this (player) device.
    Command {
        /// Device that issued the command.
        #[serde(rename = "fromDeviceId")]
        from_device_id: String,
        /// Opaque command body, as sent by the remote.
        #[schema(value_type = Object)]
        payload: Value,
    },
    /// Request could not be honoured.
    Error {
        /// Human readable reason.
        message: String,
    },
}
