//! Application-level configuration loading, including the election timing knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ROLES_COORDINATOR_CONFIG_PATH";

/// Timing and retry parameters used by the presence registry and the role election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionSettings {
    /// A device whose last heartbeat is older than this is no longer a candidate.
    pub stale_after: Duration,
    /// Damping window opened after every committed assignment.
    pub cooldown: Duration,
    /// Lease of the per-user election lock.
    pub lock_lease: Duration,
    /// Total number of lock acquisition attempts before giving up.
    pub lock_attempts: u32,
    /// Base delay between two lock acquisition attempts.
    pub lock_retry_delay: Duration,
}

impl Default for ElectionSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            cooldown: Duration::from_secs(3),
            lock_lease: Duration::from_secs(5),
            lock_attempts: 5,
            lock_retry_delay: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    election: ElectionSettings,
    sweep_interval: Duration,
    store_health_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        settings = ?app_config.election,
                        "loaded election settings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Replace the election timing knobs, keeping the remaining settings.
    pub fn with_election(mut self, election: ElectionSettings) -> Self {
        self.election = election;
        self
    }

    /// Election timing knobs.
    pub fn election(&self) -> &ElectionSettings {
        &self.election
    }

    /// Cadence of the background re-election sweep.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Cadence of the coordination store health check.
    pub fn store_health_interval(&self) -> Duration {
        self.store_health_interval
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    stale_ms: u64,
    cooldown_ms: u64,
    lock_lease_ms: u64,
    lock_attempts: u32,
    lock_retry_delay_ms: u64,
    sweep_interval_ms: u64,
    store_health_interval_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            stale_ms: 30_000,
            cooldown_ms: 3_000,
            lock_lease_ms: 5_000,
            lock_attempts: 5,
            lock_retry_delay_ms: 50,
            sweep_interval_ms: 10_000,
            store_health_interval_ms: 5_000,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            election: ElectionSettings {
                stale_after: Duration::from_millis(value.stale_ms),
                cooldown: Duration::from_millis(value.cooldown_ms),
                lock_lease: Duration::from_millis(value.lock_lease_ms),
                lock_attempts: value.lock_attempts.max(1),
                lock_retry_delay: Duration::from_millis(value.lock_retry_delay_ms),
            },
            sweep_interval: Duration::from_millis(value.sweep_interval_ms.max(1)),
            store_health_interval: Duration::from_millis(value.store_health_interval_ms.max(1)),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_election_settings_defaults() {
        assert_eq!(AppConfig::default().election(), &ElectionSettings::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "stale_ms": 1000 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.election().stale_after, Duration::from_millis(1_000));
        assert_eq!(config.election().cooldown, Duration::from_secs(3));
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let raw: RawConfig = serde_json::from_str(r#"{ "lock_attempts": 0 }"#).unwrap();
        assert_eq!(AppConfig::from(raw).election().lock_attempts, 1);
    }
}
