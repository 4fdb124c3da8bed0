use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::devices::DeviceSummary,
    error::AppError,
    services::roles_service,
    state::{SharedState, roles::RolesState},
};

/// Read-only views over presence and role assignments.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users/{user_id}/roles", get(get_roles))
        .route("/users/{user_id}/devices", get(list_devices))
        .route("/users/{user_id}/devices/{device_id}", get(get_device))
}

/// Current role assignment of a user.
#[utoipa::path(
    get,
    path = "/users/{user_id}/roles",
    tag = "roles",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Current roles (version 0 when never elected)", body = RolesState),
        (status = 400, description = "Malformed user identifier"),
        (status = 503, description = "Coordination store unavailable")
    )
)]
pub async fn get_roles(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<RolesState>, AppError> {
    Ok(Json(roles_service::current_roles(&state, &user_id).await?))
}

/// Devices of a user that currently take part in elections.
#[utoipa::path(
    get,
    path = "/users/{user_id}/devices",
    tag = "roles",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Active devices", body = [DeviceSummary]),
        (status = 400, description = "Malformed user identifier"),
        (status = 503, description = "Coordination store unavailable")
    )
)]
pub async fn list_devices(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DeviceSummary>>, AppError> {
    Ok(Json(roles_service::active_devices(&state, &user_id).await?))
}

/// One registered device, whether or not it is still heartbeating.
#[utoipa::path(
    get,
    path = "/users/{user_id}/devices/{device_id}",
    tag = "roles",
    params(
        ("user_id" = String, Path, description = "User identifier"),
        ("device_id" = String, Path, description = "Device identifier")
    ),
    responses(
        (status = 200, description = "Device", body = DeviceSummary),
        (status = 404, description = "Device not registered")
    )
)]
pub async fn get_device(
    State(state): State<SharedState>,
    Path((user_id, device_id)): Path<(String, String)>,
) -> Result<Json<DeviceSummary>, AppError> {
    Ok(Json(
        roles_service::device(&state, &user_id, &device_id).await?,
    ))
}
