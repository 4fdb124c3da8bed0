use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the coordination store and report health alongside the degraded flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let check_failed = match state.store().health_check().await {
        Ok(()) => false,
        Err(err) => {
            warn!(error = %err, "coordination store health check failed");
            true
        }
    };

    HealthResponse::new(
        check_failed || state.is_degraded(),
        state.store_kind(),
        state.sockets().len(),
    )
}
