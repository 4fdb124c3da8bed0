use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Coordination store backend in use ("redis" or "memory").
    pub store: String,
    /// Device sockets served by this process.
    pub local_sockets: usize,
}

impl HealthResponse {
    /// Build a response from the degraded flag and local counters.
    pub fn new(degraded: bool, store: &str, local_sockets: usize) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            store: store.to_string(),
            local_sockets,
        }
    }
}
