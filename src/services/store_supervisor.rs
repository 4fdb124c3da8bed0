use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{dao::storage::StorageError, state::SharedState};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Probe the coordination store forever and keep the shared state in degraded mode
/// while it is unreachable.
pub async fn run(state: SharedState) {
    let interval = state.config().store_health_interval();
    let store = state.store().clone();
    supervise(state, interval, move || store.health_check()).await
}

/// Health loop behind [`run`], parameterized over the health check.
///
/// Polls every `interval` while healthy; once a check fails the flag is raised and the
/// check is retried with exponential backoff until it succeeds again.
pub async fn supervise<F, Fut>(state: SharedState, interval: Duration, mut check: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("coordination store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                delay = INITIAL_DELAY;
                sleep(interval).await;
            }
            Err(err) => {
                if state.is_degraded() {
                    warn!(error = %err, retry_in = ?delay, "coordination store still unavailable");
                } else {
                    warn!(error = %err, "coordination store health check failed; entering degraded mode");
                    state.update_degraded(true);
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}
