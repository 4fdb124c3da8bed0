pub mod memory;
/// Redis-backed store shared by every instance.
#[cfg(feature = "redis-store")]
pub mod redis;

use std::{collections::HashMap, time::Duration};

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// Proof of ownership of a lease-bound lock, handed back to [`PresenceStore::release_lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    /// Locked resource key.
    pub resource: String,
    /// Random value identifying this particular acquisition.
    pub token: String,
}

/// Shared coordination store reachable from every process instance.
///
/// Exposes the set, hash, sorted-set, expiring-key and lock primitives the presence
/// registry and the role election engine are written against. Every method is a
/// single atomic store operation.
pub trait PresenceStore: Send + Sync {
    /// Add `member` to the set at `key`.
    fn set_add(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove `member` from the set at `key`.
    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Members of the set at `key`, in no particular order.
    fn set_members(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<String>>>;

    /// Write (or overwrite) the given hash fields, creating the hash if needed.
    fn hash_set(
        &self,
        key: String,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Write `field` only when it is not already present. Returns whether it was written.
    fn hash_set_if_absent(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Write `field` only when the hash already exists. Returns whether it was written.
    fn hash_update_existing(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// One hash field, `None` when the field or the hash is missing.
    fn hash_get(&self, key: String, field: String)
    -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// All fields of a hash; empty when the hash does not exist.
    fn hash_get_all(&self, key: String)
    -> BoxFuture<'static, StorageResult<HashMap<String, String>>>;

    /// Plain string value at `key`.
    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Store a plain string value at `key`, without expiry.
    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a key of any type. Deleting a missing key is not an error.
    fn delete(&self, key: String) -> BoxFuture<'static, StorageResult<()>>;

    /// Insert or re-score `member` in the sorted set at `key`.
    fn sorted_set_add(
        &self,
        key: String,
        member: String,
        score: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove `member` from the sorted set at `key`.
    fn sorted_set_remove(&self, key: String, member: String)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Members whose score lies in `min..=max`, lowest score first.
    fn sorted_set_range_by_score(
        &self,
        key: String,
        min: u64,
        max: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>>;

    /// Create (or refresh) a marker key that disappears after `ttl`.
    fn set_marker(&self, key: String, ttl: Duration) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether an unexpired marker exists at `key`.
    fn marker_exists(&self, key: String) -> BoxFuture<'static, StorageResult<bool>>;

    /// Try once to take the lock on `resource` for `lease`.
    ///
    /// Returns `None` while another holder's lease is still running.
    fn acquire_lock(
        &self,
        resource: String,
        lease: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<LockToken>>>;
    /// Release a lock if `token` still owns it. Idempotent: releasing an expired or
    /// already released lock is a no-op.
    fn release_lock(&self, token: LockToken) -> BoxFuture<'static, StorageResult<()>>;

    /// Round-trip to the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
