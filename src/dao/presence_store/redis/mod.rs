mod config;
mod connection;
mod error;
/// [`PresenceStore`](crate::dao::presence_store::PresenceStore) implementation.
pub mod store;

pub use config::RedisConfig;
pub use error::RedisDaoError;
pub use store::RedisPresenceStore;

use crate::dao::storage::StorageError;

impl From<RedisDaoError> for StorageError {
    fn from(err: RedisDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
