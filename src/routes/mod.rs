use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check route.
pub mod health;
/// Presence and roles read routes.
pub mod roles;
/// Device WebSocket endpoint.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(roles::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
