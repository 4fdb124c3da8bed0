//! Single-process [`PresenceStore`] kept entirely in memory.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture};
use tokio::time::Instant;
use uuid::Uuid;

use crate::dao::{
    presence_store::{LockToken, PresenceStore},
    storage::StorageResult,
};

/// Store for single-instance deployments and tests. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryPresenceStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sets: DashMap<String, HashSet<String>>,
    hashes: DashMap<String, HashMap<String, String>>,
    strings: DashMap<String, String>,
    sorted_sets: DashMap<String, HashMap<String, u64>>,
    markers: DashMap<String, Instant>,
    locks: DashMap<String, Lease>,
}

struct Lease {
    token: String,
    expires_at: Instant,
}

impl MemoryPresenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn ready<T: Send + 'static>(value: T) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(Ok(value)))
}

impl PresenceStore for MemoryPresenceStore {
    fn set_add(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.sets.entry(key).or_default().insert(member);
        ready(())
    }

    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>> {
        if let Entry::Occupied(mut entry) = self.inner.sets.entry(key) {
            entry.get_mut().remove(&member);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        ready(())
    }

    fn set_members(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let members = self
            .inner
            .sets
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ready(members)
    }

    fn hash_set(
        &self,
        key: String,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.hashes.entry(key).or_default().extend(fields);
        ready(())
    }

    fn hash_set_if_absent(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let mut hash = self.inner.hashes.entry(key).or_default();
        let written = match hash.entry(field) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        };
        ready(written)
    }

    fn hash_update_existing(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let written = match self.inner.hashes.get_mut(&key) {
            Some(mut hash) => {
                hash.insert(field, value);
                true
            }
            None => false,
        };
        ready(written)
    }

    fn hash_get(
        &self,
        key: String,
        field: String,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let value = self
            .inner
            .hashes
            .get(&key)
            .and_then(|hash| hash.get(&field).cloned());
        ready(value)
    }

    fn hash_get_all(
        &self,
        key: String,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>> {
        let hash = self
            .inner
            .hashes
            .get(&key)
            .map(|hash| hash.clone())
            .unwrap_or_default();
        ready(hash)
    }

    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        ready(self.inner.strings.get(&key).map(|value| value.clone()))
    }

    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.strings.insert(key, value);
        ready(())
    }

    fn delete(&self, key: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = &self.inner;
        inner.sets.remove(&key);
        inner.hashes.remove(&key);
        inner.strings.remove(&key);
        inner.sorted_sets.remove(&key);
        inner.markers.remove(&key);
        inner.locks.remove(&key);
        ready(())
    }

    fn sorted_set_add(
        &self,
        key: String,
        member: String,
        score: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner
            .sorted_sets
            .entry(key)
            .or_default()
            .insert(member, score);
        ready(())
    }

    fn sorted_set_remove(
        &self,
        key: String,
        member: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if let Entry::Occupied(mut entry) = self.inner.sorted_sets.entry(key) {
            entry.get_mut().remove(&member);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        ready(())
    }

    fn sorted_set_range_by_score(
        &self,
        key: String,
        min: u64,
        max: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let mut members = self
            .inner
            .sorted_sets
            .get(&key)
            .map(|zset| {
                zset.iter()
                    .filter(|(_, score)| (min..=max).contains(*score))
                    .map(|(member, score)| (*score, member.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        members.sort();
        ready(members.into_iter().map(|(_, member)| member).collect())
    }

    fn set_marker(&self, key: String, ttl: Duration) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.markers.insert(key, Instant::now() + ttl);
        ready(())
    }

    fn marker_exists(&self, key: String) -> BoxFuture<'static, StorageResult<bool>> {
        let now = Instant::now();
        // Expired markers are dropped lazily on read.
        self.inner
            .markers
            .remove_if(&key, |_, expires_at| *expires_at <= now);
        ready(self.inner.markers.contains_key(&key))
    }

    fn acquire_lock(
        &self,
        resource: String,
        lease: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<LockToken>>> {
        let now = Instant::now();
        let token = Uuid::new_v4().simple().to_string();
        let acquired = match self.inner.locks.entry(resource.clone()) {
            Entry::Occupied(mut held) => {
                if held.get().expires_at > now {
                    false
                } else {
                    held.insert(Lease {
                        token: token.clone(),
                        expires_at: now + lease,
                    });
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Lease {
                    token: token.clone(),
                    expires_at: now + lease,
                });
                true
            }
        };
        ready(acquired.then_some(LockToken { resource, token }))
    }

    fn release_lock(&self, token: LockToken) -> BoxFuture<'static, StorageResult<()>> {
        self.inner
            .locks
            .remove_if(&token.resource, |_, lease| lease.token == token.token);
        ready(())
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(())
    }
}
