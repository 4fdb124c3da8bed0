//! Periodic re-election for users with sockets on this process.
//!
//! Heartbeats only refresh timestamps; a device that goes silent is dropped from the
//! assignment the next time an election runs. The sweep makes sure one does run.

use std::time::Duration;

use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::{services::roles_events, state::SharedState};

/// Handle to a running sweep task.
pub struct SweepHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Stop the sweep and wait for the in-flight pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

/// Spawn the sweep, running one pass every `interval`.
pub fn spawn(state: SharedState, interval: Duration) -> SweepHandle {
    let (shutdown, mut shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; joins already elect.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    sweep_once(&state).await;
                }
            }
        }
        info!("election sweep stopped");
    });
    SweepHandle { shutdown, task }
}

/// Re-elect every user that has at least one local socket. Returns how many commits
/// were made.
pub async fn sweep_once(state: &SharedState) -> usize {
    let mut committed = 0;
    for user_id in state.sockets().users() {
        if let Some(outcome) = roles_events::elect_and_publish_logged(state, &user_id).await {
            if outcome.committed {
                committed += 1;
            }
        }
    }
    if committed > 0 {
        debug!(committed, "election sweep committed new roles");
    }
    committed
}
