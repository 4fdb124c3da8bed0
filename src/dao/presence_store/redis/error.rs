use redis::RedisError;
use thiserror::Error;

/// Result alias for the Redis adapter.
pub type RedisResult<T> = std::result::Result<T, RedisDaoError>;

/// Failures of the Redis adapter, converted into [`StorageError`](crate::dao::storage::StorageError) at the trait boundary.
#[derive(Debug, Error)]
pub enum RedisDaoError {
    /// Required environment variable is not set.
    #[error("missing Redis environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Connection URL could not be parsed.
    #[error("failed to parse Redis connection URL `{url}`")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Parser error.
        #[source]
        source: RedisError,
    },
    /// Server never answered PING while connecting.
    #[error("Redis ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last ping error.
        #[source]
        source: RedisError,
    },
    /// A command returned an error.
    #[error("Redis command `{operation}` failed")]
    Command {
        /// Command name.
        operation: &'static str,
        /// Redis error.
        #[source]
        source: RedisError,
    },
}
