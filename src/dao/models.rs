use std::collections::HashMap;

use thiserror::Error;

use crate::state::device::{Device, DeviceType, Role};

/// Device identifier field.
pub const FIELD_DEVICE_ID: &str = "device_id";
/// Lowercase device type field.
pub const FIELD_DEVICE_TYPE: &str = "device_type";
/// `true` / `false` playback capability field.
pub const FIELD_CAN_PLAY: &str = "can_play";
/// Preferred role field, empty when unset.
pub const FIELD_PREFERRED_ROLE: &str = "preferred_role";
/// Socket currently bound to the device.
pub const FIELD_SOCKET_ID: &str = "socket_id";
/// First-seen time in epoch milliseconds.
pub const FIELD_CONNECTED_AT: &str = "connected_at";
/// Last heartbeat in epoch milliseconds.
pub const FIELD_LAST_HEARTBEAT: &str = "last_heartbeat";

/// A device hash read back from the store could not be turned into a [`Device`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceRecordError {
    /// A required field is absent.
    #[error("device record is missing field `{0}`")]
    MissingField(&'static str),
    /// A field holds a value that cannot be parsed.
    #[error("device record field `{field}` has invalid value `{value}`")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Raw stored value.
        value: String,
    },
}

/// Hash fields written on every registration.
///
/// `connected_at` is intentionally absent: it is written separately with
/// set-if-absent semantics so re-registrations keep the first-seen time.
pub fn device_fields(device: &Device) -> Vec<(String, String)> {
    let mut fields = vec![
        (FIELD_DEVICE_ID.to_string(), device.device_id.clone()),
        (
            FIELD_DEVICE_TYPE.to_string(),
            device.device_type.as_str().to_string(),
        ),
        (FIELD_CAN_PLAY.to_string(), device.can_play.to_string()),
        (FIELD_SOCKET_ID.to_string(), device.socket_id.clone()),
        (
            FIELD_LAST_HEARTBEAT.to_string(),
            device.last_heartbeat.to_string(),
        ),
    ];
    // An empty value clears a hint sent by a previous registration.
    fields.push((
        FIELD_PREFERRED_ROLE.to_string(),
        device
            .preferred_role
            .map(|role| role.as_str().to_string())
            .unwrap_or_default(),
    ));
    fields
}

/// Rebuild a [`Device`] from its stored hash.
pub fn device_from_fields(fields: &HashMap<String, String>) -> Result<Device, DeviceRecordError> {
    let device_id = required(fields, FIELD_DEVICE_ID)?.to_string();
    let device_type = DeviceType::from(required(fields, FIELD_DEVICE_TYPE)?);
    let can_play = match required(fields, FIELD_CAN_PLAY)? {
        "true" | "1" => true,
        "false" | "0" => false,
        other => {
            return Err(DeviceRecordError::InvalidField {
                field: FIELD_CAN_PLAY,
                value: other.to_string(),
            });
        }
    };
    let preferred_role = fields
        .get(FIELD_PREFERRED_ROLE)
        .and_then(|value| Role::parse(value));
    let socket_id = required(fields, FIELD_SOCKET_ID)?.to_string();
    let connected_at = timestamp(fields, FIELD_CONNECTED_AT)?;
    let last_heartbeat = timestamp(fields, FIELD_LAST_HEARTBEAT)?;

    Ok(Device {
        device_id,
        device_type,
        can_play,
        preferred_role,
        socket_id,
        connected_at,
        last_heartbeat,
    })
}

fn required<'a>(
    fields: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a str, DeviceRecordError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or(DeviceRecordError::MissingField(field))
}

fn timestamp(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<u64, DeviceRecordError> {
    let raw = required(fields, field)?;
    raw.parse::<u64>()
        .map_err(|_| DeviceRecordError::InvalidField {
            field,
            value: raw.to_string(),
        })
}
