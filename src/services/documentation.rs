use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the roles coordinator.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::roles::get_roles,
        crate::routes::roles::list_devices,
        crate::routes::roles::get_device,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::devices::DeviceSummary,
            crate::dto::ws::DeviceInboundMessage,
            crate::dto::ws::DeviceDescriptor,
            crate::dto::ws::DeviceOutboundMessage,
            crate::state::roles::RolesState,
            crate::state::device::DeviceType,
            crate::state::device::Role,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "roles", description = "Presence and role assignment views"),
        (name = "devices", description = "WebSocket operations for user devices"),
    )
)]
pub struct ApiDoc;
