use std::time::Duration;

use super::error::{RedisDaoError, RedisResult};

/// Per-command deadline applied when nothing else is configured.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Runtime configuration describing how to reach Redis.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `redis://` connection URL.
    pub url: String,
    /// Deadline applied to every command.
    pub command_timeout: Duration,
}

impl RedisConfig {
    /// Construct a configuration for the given `redis://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the per-command deadline.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Build a configuration from `REDIS_URL` and the optional
    /// `REDIS_COMMAND_TIMEOUT_MS`.
    pub fn from_env() -> RedisResult<Self> {
        let url = std::env::var("REDIS_URL")
            .map_err(|_| RedisDaoError::MissingEnvVar { var: "REDIS_URL" })?;
        let config = Self::new(url);
        Ok(
            match std::env::var("REDIS_COMMAND_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
            {
                Some(millis) => config.with_command_timeout(Duration::from_millis(millis)),
                None => config,
            },
        )
    }
}
