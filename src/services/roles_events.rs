use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    services::role_election::ElectionOutcome,
    state::{SharedState, roles::RolesState},
};

/// Re-elect roles for `user_id` and push the authoritative assignment to its local sockets.
///
/// The push happens whether or not this run committed: sockets already holding the
/// version are skipped, so an unchanged outcome only reaches sockets that missed a
/// commit made by another instance.
pub async fn elect_and_publish(
    state: &SharedState,
    user_id: &str,
) -> Result<ElectionOutcome, ServiceError> {
    let outcome = state.election().elect(user_id).await?;
    publish_roles(state, user_id, &outcome.roles);
    Ok(outcome)
}

/// Same as [`elect_and_publish`] but only logs failures; used where there is no caller
/// to report to (socket teardown, background sweep).
pub async fn elect_and_publish_logged(state: &SharedState, user_id: &str) -> Option<ElectionOutcome> {
    match elect_and_publish(state, user_id).await {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!(user_id, error = %err, "role election failed");
            None
        }
    }
}

/// Push `roles` to the local sockets of `user_id` that do not hold it yet.
pub fn publish_roles(state: &SharedState, user_id: &str, roles: &RolesState) -> usize {
    let reached = state.delivery().broadcast_roles(user_id, roles);
    if reached > 0 {
        debug!(user_id, version = roles.version, reached, "roles broadcast");
    }
    reached
}
