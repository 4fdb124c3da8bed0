use std::{future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::ElectionSettings,
    dao::presence_store::{LockToken, PresenceStore},
    error::ServiceError,
};

/// How a lease-bound lock is taken: lease length and bounded retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// How long the lock stays held if never released.
    pub lease: Duration,
    /// Acquisition attempts before giving up, at least one.
    pub attempts: u32,
    /// Base pause between attempts; up to half of it is added as jitter.
    pub retry_delay: Duration,
}

impl From<&ElectionSettings> for LockPolicy {
    fn from(settings: &ElectionSettings) -> Self {
        Self {
            lease: settings.lock_lease,
            attempts: settings.lock_attempts.max(1),
            retry_delay: settings.lock_retry_delay,
        }
    }
}

/// Try to take the lock on `resource`, sleeping a jittered `retry_delay` between attempts.
async fn acquire(
    store: &Arc<dyn PresenceStore>,
    resource: &str,
    policy: LockPolicy,
) -> Result<LockToken, ServiceError> {
    for attempt in 1..=policy.attempts {
        if let Some(token) = store
            .acquire_lock(resource.to_string(), policy.lease)
            .await?
        {
            return Ok(token);
        }

        if attempt < policy.attempts {
            let jitter_ceiling = u64::try_from(policy.retry_delay.as_millis() / 2).unwrap_or(0);
            let jitter = rand::rng().random_range(0..=jitter_ceiling);
            debug!(resource, attempt, "lock busy; retrying");
            sleep(policy.retry_delay + Duration::from_millis(jitter)).await;
        }
    }

    Err(ServiceError::LockUnavailable {
        resource: resource.to_string(),
        attempts: policy.attempts,
    })
}

/// Run `work` while holding the lock on `resource`.
///
/// The lock is released once `work` finishes, whether it returns an error or panics;
/// a panic is re-raised after the release. If the holder dies before that, the lease
/// runs out on its own.
pub async fn with_lock<F, Fut, T>(
    store: &Arc<dyn PresenceStore>,
    resource: &str,
    policy: LockPolicy,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let token = acquire(store, resource, policy).await?;

    let outcome = AssertUnwindSafe(work()).catch_unwind().await;

    if let Err(err) = store.release_lock(token).await {
        warn!(resource, error = %err, "failed to release lock; waiting for lease expiry");
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
