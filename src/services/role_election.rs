use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::ElectionSettings,
    dao::{keys, presence_store::PresenceStore},
    error::ServiceError,
    services::{
        lock::{LockPolicy, with_lock},
        presence_registry::PresenceRegistry,
    },
    state::{
        device::{Device, DeviceType},
        roles::RolesState,
    },
};

/// Result of one election run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionOutcome {
    /// Authoritative assignment after the run.
    pub roles: RolesState,
    /// Whether a new assignment was written (and must be broadcast).
    pub committed: bool,
    /// Whether the damping window of a previous commit was still open.
    pub in_cooldown: bool,
}

/// Player and remote picked for a set of active devices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    /// Elected player device id.
    pub player: Option<String>,
    /// Elected remote device id.
    pub remote: Option<String>,
}

/// Sort devices by descending `rank`, oldest connection first on ties, then by id.
fn ranked<'a>(
    devices: impl Iterator<Item = &'a Device>,
    rank: fn(DeviceType) -> u8,
) -> Vec<&'a Device> {
    let mut devices: Vec<&Device> = devices.collect();
    devices.sort_by(|a, b| {
        rank(b.device_type)
            .cmp(&rank(a.device_type))
            .then_with(|| a.connected_at.cmp(&b.connected_at))
            .then_with(|| a.device_id.cmp(&b.device_id))
    });
    devices
}

/// Deterministically map a set of active devices to a (player, remote) pair.
pub fn compute_assignment(devices: &[Device]) -> Assignment {
    match devices {
        [] => Assignment::default(),
        [only] => Assignment {
            player: Some(only.device_id.clone()),
            remote: Some(only.device_id.clone()),
        },
        _ => {
            let player_candidates = if devices.iter().any(|device| device.can_play) {
                ranked(
                    devices.iter().filter(|device| device.can_play),
                    DeviceType::player_priority,
                )
            } else {
                ranked(devices.iter(), DeviceType::player_priority)
            };
            let player = player_candidates[0];

            let remote = ranked(
                devices
                    .iter()
                    .filter(|device| device.device_id != player.device_id),
                DeviceType::remote_priority,
            )
            .first()
            .copied()
            .unwrap_or(player);

            Assignment {
                player: Some(player.device_id.clone()),
                remote: Some(remote.device_id.clone()),
            }
        }
    }
}

/// Computes and persists the per-user role assignment.
#[derive(Clone)]
pub struct RoleElection {
    store: Arc<dyn PresenceStore>,
    registry: PresenceRegistry,
    settings: ElectionSettings,
}

impl RoleElection {
    /// Build an election engine sharing `store` with `registry`.
    pub fn new(
        store: Arc<dyn PresenceStore>,
        registry: PresenceRegistry,
        settings: ElectionSettings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Presence registry the engine reads candidates from.
    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    /// Timing knobs in use.
    pub fn settings(&self) -> &ElectionSettings {
        &self.settings
    }

    /// Read the persisted assignment without locking.
    ///
    /// A missing or unparsable value reads as [`RolesState::zero`].
    pub async fn get_current_roles(&self, user_id: &str) -> Result<RolesState, ServiceError> {
        Ok(self.load_roles(user_id).await?.0)
    }

    /// Stored roles plus whether a readable value was actually present.
    async fn load_roles(&self, user_id: &str) -> Result<(RolesState, bool), ServiceError> {
        let Some(raw) = self.store.get(keys::user_roles(user_id)).await? else {
            return Ok((RolesState::zero(), false));
        };
        match serde_json::from_str::<RolesState>(&raw) {
            Ok(roles) => Ok((roles, true)),
            Err(err) => {
                warn!(user_id, error = %err, "unreadable roles state; treating as empty");
                Ok((RolesState::zero(), false))
            }
        }
    }

    /// Re-elect using the configured staleness threshold.
    pub async fn elect(&self, user_id: &str) -> Result<ElectionOutcome, ServiceError> {
        let stale_ms = u64::try_from(self.settings.stale_after.as_millis()).unwrap_or(u64::MAX);
        self.elect_roles(user_id, stale_ms).await
    }

    /// Recompute the assignment from the devices active within `stale_ms`.
    ///
    /// Runs under the per-user election lock. A new version is written only when the
    /// player or remote actually changes (or nothing was ever stored); otherwise the
    /// previous state is returned untouched. Fails with
    /// [`ServiceError::LockUnavailable`] when the lock stays busy, leaving the stored
    /// state authoritative.
    pub async fn elect_roles(
        &self,
        user_id: &str,
        stale_ms: u64,
    ) -> Result<ElectionOutcome, ServiceError> {
        let policy = LockPolicy::from(&self.settings);
        with_lock(&self.store, &keys::user_roles_lock(user_id), policy, || {
            self.elect_locked(user_id, stale_ms)
        })
        .await
    }

    async fn elect_locked(
        &self,
        user_id: &str,
        stale_ms: u64,
    ) -> Result<ElectionOutcome, ServiceError> {
        let now = self.registry.now_ms();
        let devices = self
            .registry
            .list_active_devices(user_id, now, stale_ms)
            .await?;
        let (previous, persisted) = self.load_roles(user_id).await?;

        let Assignment { player, remote } = compute_assignment(&devices);
        let next = RolesState {
            version: previous.version + 1,
            player_device_id: player,
            remote_device_id: remote,
        };

        let cooldown_key = keys::user_roles_cooldown(user_id);
        if persisted && next.same_assignment(&previous) {
            let in_cooldown = self.store.marker_exists(cooldown_key).await?;
            debug!(
                user_id,
                version = previous.version,
                in_cooldown,
                "assignment unchanged; keeping previous roles"
            );
            return Ok(ElectionOutcome {
                roles: previous,
                committed: false,
                in_cooldown,
            });
        }

        let payload = serde_json::to_string(&next)?;
        self.store.set(keys::user_roles(user_id), payload).await?;
        self.store
            .set_marker(cooldown_key, self.settings.cooldown)
            .await?;

        info!(
            user_id,
            version = next.version,
            player = ?next.player_device_id,
            remote = ?next.remote_device_id,
            active_devices = devices.len(),
            "roles committed"
        );
        Ok(ElectionOutcome {
            roles: next,
            committed: true,
            in_cooldown: false,
        })
    }

    /// Socket currently bound to the elected player, if it is still registered.
    pub async fn resolve_player_socket_id(
        &self,
        user_id: &str,
        roles: &RolesState,
    ) -> Result<Option<String>, ServiceError> {
        let Some(player) = roles.player_device_id.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .registry
            .get_device(user_id, player)
            .await?
            .map(|device| device.socket_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::presence_store::memory::MemoryPresenceStore,
        state::{
            clock::ManualClock,
            device::{DeviceMetadata, Role},
        },
    };

    const STALE_MS: u64 = 10_000;

    struct Harness {
        election: RoleElection,
        clock: Arc<ManualClock>,
        store: Arc<MemoryPresenceStore>,
    }

    impl Harness {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(0));
            let store = Arc::new(MemoryPresenceStore::new());
            let registry = PresenceRegistry::new(store.clone(), clock.clone());
            let settings = ElectionSettings {
                stale_after: Duration::from_millis(STALE_MS),
                ..ElectionSettings::default()
            };
            Self {
                election: RoleElection::new(store.clone(), registry, settings),
                clock,
                store,
            }
        }

        async fn join(&self, at: u64, device_id: &str, device_type: DeviceType, can_play: bool) {
            self.clock.set(at);
            self.election
                .registry()
                .register_device(
                    "user",
                    DeviceMetadata {
                        device_id: device_id.into(),
                        device_type,
                        can_play,
                        preferred_role: None,
                    },
                    &format!("socket-{device_id}"),
                )
                .await
                .unwrap();
        }

        async fn elect(&self) -> ElectionOutcome {
            self.election.elect_roles("user", STALE_MS).await.unwrap()
        }
    }

    fn device(id: &str, device_type: DeviceType, can_play: bool, connected_at: u64) -> Device {
        Device {
            device_id: id.into(),
            device_type,
            can_play,
            preferred_role: None,
            socket_id: format!("socket-{id}"),
            connected_at,
            last_heartbeat: connected_at,
        }
    }

    #[test]
    fn desktop_plays_and_phone_controls() {
        let assignment = compute_assignment(&[
            device("a", DeviceType::Phone, true, 100),
            device("b", DeviceType::Desktop, true, 200),
        ]);
        assert_eq!(assignment.player.as_deref(), Some("b"));
        assert_eq!(assignment.remote.as_deref(), Some("a"));
    }

    #[test]
    fn remote_does_not_need_playback_capability() {
        let assignment = compute_assignment(&[
            device("a", DeviceType::Desktop, true, 100),
            device("b", DeviceType::Tablet, false, 200),
        ]);
        assert_eq!(assignment.player.as_deref(), Some("a"));
        assert_eq!(assignment.remote.as_deref(), Some("b"));
    }

    #[test]
    fn falls_back_to_all_devices_when_none_can_play() {
        let assignment = compute_assignment(&[
            device("phone", DeviceType::Phone, false, 100),
            device("tablet", DeviceType::Tablet, false, 200),
        ]);
        assert_eq!(assignment.player.as_deref(), Some("tablet"));
        assert_eq!(assignment.remote.as_deref(), Some("phone"));
    }

    #[test]
    fn earliest_connection_wins_ties() {
        let assignment = compute_assignment(&[
            device("late-desk", DeviceType::Desktop, true, 300),
            device("early-desk", DeviceType::Desktop, true, 100),
            device("late-phone", DeviceType::Phone, true, 400),
            device("early-phone", DeviceType::Phone, true, 200),
        ]);
        assert_eq!(assignment.player.as_deref(), Some("early-desk"));
        assert_eq!(assignment.remote.as_deref(), Some("early-phone"));
    }

    #[test]
    fn unknown_device_types_only_break_ties_by_connection_time() {
        let assignment = compute_assignment(&[
            device("second", DeviceType::Other, true, 200),
            device("first", DeviceType::Other, true, 100),
        ]);
        assert_eq!(assignment.player.as_deref(), Some("first"));
        assert_eq!(assignment.remote.as_deref(), Some("second"));
    }

    #[test]
    fn preferred_role_is_advisory_only() {
        let mut phone = device("phone", DeviceType::Phone, true, 100);
        phone.preferred_role = Some(Role::Player);
        let mut desk = device("desk", DeviceType::Desktop, true, 200);
        desk.preferred_role = Some(Role::Remote);

        let assignment = compute_assignment(&[phone, desk]);
        assert_eq!(assignment.player.as_deref(), Some("desk"));
        assert_eq!(assignment.remote.as_deref(), Some("phone"));
    }

    #[tokio::test]
    async fn zero_devices_yields_empty_assignment() {
        let harness = Harness::new();
        let outcome = harness.elect().await;
        assert!(outcome.committed);
        assert_eq!(
            outcome.roles,
            RolesState {
                version: 1,
                player_device_id: None,
                remote_device_id: None,
            }
        );
    }

    #[tokio::test]
    async fn single_device_is_its_own_remote() {
        let harness = Harness::new();
        harness.join(100, "solo", DeviceType::Phone, false).await;

        let roles = harness.elect().await.roles;
        assert_eq!(roles.player_device_id.as_deref(), Some("solo"));
        assert_eq!(roles.remote_device_id.as_deref(), Some("solo"));
        assert_eq!(roles.version, 1);
    }

    #[tokio::test]
    async fn joining_desktop_takes_over_playback_then_stale_phone_drops_out() {
        let harness = Harness::new();
        harness.join(100, "a", DeviceType::Phone, true).await;
        assert_eq!(harness.elect().await.roles.version, 1);

        harness.join(200, "b", DeviceType::Desktop, true).await;
        let roles = harness.elect().await.roles;
        assert_eq!(roles.player_device_id.as_deref(), Some("b"));
        assert_eq!(roles.remote_device_id.as_deref(), Some("a"));
        assert_eq!(roles.version, 2);

        // Only b keeps heart-beating; a falls past the threshold.
        harness.clock.set(100 + STALE_MS + 1);
        assert!(
            harness
                .election
                .registry()
                .update_heartbeat("user", "b")
                .await
                .unwrap()
        );
        let roles = harness.elect().await.roles;
        assert_eq!(roles.player_device_id.as_deref(), Some("b"));
        assert_eq!(roles.remote_device_id.as_deref(), Some("b"));
        assert_eq!(roles.version, 3);
    }

    #[tokio::test]
    async fn repeated_election_is_idempotent() {
        let harness = Harness::new();
        harness.join(100, "a", DeviceType::Phone, true).await;
        harness.join(200, "b", DeviceType::Desktop, true).await;

        let first = harness.elect().await;
        let second = harness.elect().await;
        assert!(first.committed);
        assert!(!second.committed);
        assert!(second.in_cooldown);
        assert_eq!(first.roles, second.roles);

        // Still a no-op once the damping window has passed.
        harness.store.delete(keys::user_roles_cooldown("user")).await.unwrap();
        let third = harness.elect().await;
        assert!(!third.committed);
        assert!(!third.in_cooldown);
        assert_eq!(third.roles, first.roles);
    }

    #[tokio::test]
    async fn version_never_decreases() {
        let harness = Harness::new();
        let mut last = 0;
        let steps: [(&str, DeviceType); 3] = [
            ("a", DeviceType::Phone),
            ("b", DeviceType::Desktop),
            ("c", DeviceType::Tablet),
        ];
        for (at, (id, kind)) in steps.into_iter().enumerate() {
            harness.join(at as u64 * 10, id, kind, true).await;
            let version = harness.elect().await.roles.version;
            assert!(version >= last);
            last = version;
        }
        harness
            .election
            .registry()
            .remove_device("user", "b")
            .await
            .unwrap();
        let version = harness.elect().await.roles.version;
        assert!(version > last);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_elections_commit_once() {
        let harness = Harness::new();
        harness.join(100, "a", DeviceType::Phone, true).await;
        assert_eq!(harness.elect().await.roles.version, 1);

        harness.join(200, "b", DeviceType::Desktop, true).await;
        let left = harness.election.clone();
        let right = harness.election.clone();
        let (left, right) = tokio::join!(
            tokio::spawn(async move { left.elect_roles("user", STALE_MS).await }),
            tokio::spawn(async move { right.elect_roles("user", STALE_MS).await }),
        );
        let left = left.unwrap().unwrap();
        let right = right.unwrap().unwrap();

        assert_eq!(
            [left.committed, right.committed]
                .iter()
                .filter(|committed| **committed)
                .count(),
            1
        );
        assert_eq!(left.roles, right.roles);
        assert_eq!(left.roles.version, 2);
        assert_eq!(
            harness.election.get_current_roles("user").await.unwrap().version,
            2
        );
    }

    #[tokio::test]
    async fn corrupt_roles_read_as_zero_state() {
        let harness = Harness::new();
        harness
            .store
            .set(keys::user_roles("user"), "{not json".into())
            .await
            .unwrap();
        assert_eq!(
            harness.election.get_current_roles("user").await.unwrap(),
            RolesState::zero()
        );

        // The next election replaces the garbage with a fresh state.
        let outcome = harness.elect().await;
        assert!(outcome.committed);
        assert_eq!(outcome.roles.version, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_lock_leaves_roles_untouched() {
        let harness = Harness::new();
        harness.join(100, "a", DeviceType::Phone, true).await;
        let before = harness.elect().await.roles;

        harness.join(200, "b", DeviceType::Desktop, true).await;
        let _other_process = harness
            .store
            .acquire_lock(keys::user_roles_lock("user"), Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();

        let err = harness.election.elect_roles("user", STALE_MS).await.unwrap_err();
        assert!(matches!(err, ServiceError::LockUnavailable { .. }));
        assert_eq!(
            harness.election.get_current_roles("user").await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn player_socket_resolution() {
        let harness = Harness::new();
        assert_eq!(
            harness
                .election
                .resolve_player_socket_id("user", &RolesState::zero())
                .await
                .unwrap(),
            None
        );

        harness.join(100, "desk", DeviceType::Desktop, true).await;
        let roles = harness.elect().await.roles;
        assert_eq!(
            harness
                .election
                .resolve_player_socket_id("user", &roles)
                .await
                .unwrap()
                .as_deref(),
            Some("socket-desk")
        );

        // Player vanished between the election and the lookup.
        harness
            .election
            .registry()
            .remove_device("user", "desk")
            .await
            .unwrap();
        assert_eq!(
            harness
                .election
                .resolve_player_socket_id("user", &roles)
                .await
                .unwrap(),
            None
        );
    }
}
