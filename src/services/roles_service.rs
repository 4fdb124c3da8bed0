use validator::ValidationError;

use crate::{
    dto::{devices::DeviceSummary, validation::validate_identifier},
    error::ServiceError,
    state::{SharedState, roles::RolesState},
};

fn check_identifier(kind: &str, value: &str) -> Result<(), ServiceError> {
    validate_identifier(value).map_err(|err: ValidationError| {
        ServiceError::InvalidInput(format!("invalid {kind} `{value}`: {err}"))
    })
}

/// Current role assignment of `user_id`.
pub async fn current_roles(state: &SharedState, user_id: &str) -> Result<RolesState, ServiceError> {
    check_identifier("user id", user_id)?;
    state.election().get_current_roles(user_id).await
}

/// Devices of `user_id` that are currently election candidates.
pub async fn active_devices(
    state: &SharedState,
    user_id: &str,
) -> Result<Vec<DeviceSummary>, ServiceError> {
    check_identifier("user id", user_id)?;
    let registry = state.registry();
    let stale_ms =
        u64::try_from(state.election().settings().stale_after.as_millis()).unwrap_or(u64::MAX);
    let devices = registry
        .list_active_devices(user_id, registry.now_ms(), stale_ms)
        .await?;
    let roles = state.election().get_current_roles(user_id).await?;
    Ok(devices
        .into_iter()
        .map(|device| DeviceSummary::new(device, &roles))
        .collect())
}

/// One registered device, active or not.
pub async fn device(
    state: &SharedState,
    user_id: &str,
    device_id: &str,
) -> Result<DeviceSummary, ServiceError> {
    check_identifier("user id", user_id)?;
    check_identifier("device id", device_id)?;
    let device = state
        .registry()
        .get_device(user_id, device_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("device `{device_id}` of user `{user_id}`"))
        })?;
    let roles = state.election().get_current_roles(user_id).await?;
    Ok(DeviceSummary::new(device, &roles))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::presence_store::memory::MemoryPresenceStore,
        state::{
            AppState,
            clock::ManualClock,
            device::{DeviceMetadata, DeviceType, Role},
        },
    };

    async fn state_with_phone() -> SharedState {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(MemoryPresenceStore::new()),
            "memory",
            Arc::new(ManualClock::new(1_000)),
        );
        state
            .registry()
            .register_device(
                "u",
                DeviceMetadata {
                    device_id: "phone".into(),
                    device_type: DeviceType::Phone,
                    can_play: false,
                    preferred_role: Some(Role::Remote),
                },
                "s1",
            )
            .await
            .unwrap();
        state.election().elect("u").await.unwrap();
        state
    }

    #[tokio::test]
    async fn lists_devices_with_their_roles() {
        let state = state_with_phone().await;
        let devices = active_devices(&state, "u").await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].roles, vec![Role::Player, Role::Remote]);
        assert_eq!(devices[0].connected_at, "1970-01-01T00:00:01Z");
    }

    #[tokio::test]
    async fn unknown_device_is_not_found() {
        let state = state_with_phone().await;
        assert!(matches!(
            device(&state, "u", "tv").await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(device(&state, "u", "phone").await.unwrap().device_id, "phone");
    }

    #[tokio::test]
    async fn malformed_identifiers_are_rejected() {
        let state = state_with_phone().await;
        assert!(matches!(
            current_roles(&state, "a:b").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert_eq!(current_roles(&state, "u").await.unwrap().version, 1);
    }
}
