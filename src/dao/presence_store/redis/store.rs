use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use redis::{Cmd, FromRedisValue, RedisError, Script, aio::ConnectionManager};
use tokio::time::timeout;
use uuid::Uuid;

use super::{
    config::RedisConfig,
    connection::establish_connection,
    error::{RedisDaoError, RedisResult},
};
use crate::dao::{
    presence_store::{LockToken, PresenceStore},
    storage::{StorageError, StorageResult},
};

/// Delete the lock only if it still carries our token.
const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Write a hash field only when the hash already exists.
const UPDATE_EXISTING_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
    return 1
end
return 0
"#;

/// [`PresenceStore`] on a single Redis deployment shared by all instances.
///
/// Each command runs under the configured deadline; a timeout surfaces as
/// [`StorageError::Timeout`].
#[derive(Clone)]
pub struct RedisPresenceStore {
    inner: Arc<RedisInner>,
}

struct RedisInner {
    conn: ConnectionManager,
    command_timeout: Duration,
    release_lock: Script,
    update_existing: Script,
}

impl RedisInner {
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match timeout(self.command_timeout, fut).await {
            Ok(result) => {
                result.map_err(|source| RedisDaoError::Command { operation, source }.into())
            }
            Err(_) => Err(StorageError::Timeout { operation }),
        }
    }

    async fn query<T: FromRedisValue>(&self, operation: &'static str, cmd: Cmd) -> StorageResult<T> {
        let mut conn = self.conn.clone();
        self.bounded(operation, async move { cmd.query_async(&mut conn).await })
            .await
    }
}

impl RedisPresenceStore {
    /// Connect to Redis and prepare the Lua scripts used for conditional writes.
    pub async fn connect(config: RedisConfig) -> RedisResult<Self> {
        let conn = establish_connection(&config.url).await?;
        Ok(Self {
            inner: Arc::new(RedisInner {
                conn,
                command_timeout: config.command_timeout,
                release_lock: Script::new(RELEASE_LOCK_SCRIPT),
                update_existing: Script::new(UPDATE_EXISTING_SCRIPT),
            }),
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl PresenceStore for RedisPresenceStore {
    fn set_add(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("SADD");
            cmd.arg(key).arg(member);
            inner.query::<()>("SADD", cmd).await
        })
    }

    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("SREM");
            cmd.arg(key).arg(member);
            inner.query::<()>("SREM", cmd).await
        })
    }

    fn set_members(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("SMEMBERS");
            cmd.arg(key);
            inner.query("SMEMBERS", cmd).await
        })
    }

    fn hash_set(
        &self,
        key: String,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if fields.is_empty() {
                return Ok(());
            }
            let mut cmd = redis::cmd("HSET");
            cmd.arg(key);
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
            inner.query::<()>("HSET", cmd).await
        })
    }

    fn hash_set_if_absent(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("HSETNX");
            cmd.arg(key).arg(field).arg(value);
            inner.query("HSETNX", cmd).await
        })
    }

    fn hash_update_existing(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut conn = inner.conn.clone();
            let mut invocation = inner.update_existing.key(key);
            invocation.arg(field).arg(value);
            let written: i64 = inner
                .bounded("HSET_IF_EXISTS", async move {
                    invocation.invoke_async(&mut conn).await
                })
                .await?;
            Ok(written == 1)
        })
    }

    fn hash_get(
        &self,
        key: String,
        field: String,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("HGET");
            cmd.arg(key).arg(field);
            inner.query("HGET", cmd).await
        })
    }

    fn hash_get_all(
        &self,
        key: String,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, String>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("HGETALL");
            cmd.arg(key);
            inner.query("HGETALL", cmd).await
        })
    }

    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("GET");
            cmd.arg(key);
            inner.query("GET", cmd).await
        })
    }

    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            inner.query::<()>("SET", cmd).await
        })
    }

    fn delete(&self, key: String) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("DEL");
            cmd.arg(key);
            inner.query::<()>("DEL", cmd).await
        })
    }

    fn sorted_set_add(
        &self,
        key: String,
        member: String,
        score: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("ZADD");
            cmd.arg(key).arg(score).arg(member);
            inner.query::<()>("ZADD", cmd).await
        })
    }

    fn sorted_set_remove(
        &self,
        key: String,
        member: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("ZREM");
            cmd.arg(key).arg(member);
            inner.query::<()>("ZREM", cmd).await
        })
    }

    fn sorted_set_range_by_score(
        &self,
        key: String,
        min: u64,
        max: u64,
    ) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("ZRANGEBYSCORE");
            cmd.arg(key).arg(min).arg(max);
            inner.query("ZRANGEBYSCORE", cmd).await
        })
    }

    fn set_marker(&self, key: String, ttl: Duration) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(1).arg("PX").arg(millis(ttl));
            inner.query::<()>("SET_PX", cmd).await
        })
    }

    fn marker_exists(&self, key: String) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut cmd = redis::cmd("EXISTS");
            cmd.arg(key);
            inner.query("EXISTS", cmd).await
        })
    }

    fn acquire_lock(
        &self,
        resource: String,
        lease: Duration,
    ) -> BoxFuture<'static, StorageResult<Option<LockToken>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let token = Uuid::new_v4().simple().to_string();
            let mut cmd = redis::cmd("SET");
            cmd.arg(&resource)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(millis(lease));
            let reply: Option<String> = inner.query("SET_NX", cmd).await?;
            Ok(reply.map(|_| LockToken { resource, token }))
        })
    }

    fn release_lock(&self, token: LockToken) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut conn = inner.conn.clone();
            let mut invocation = inner.release_lock.key(token.resource);
            invocation.arg(token.token);
            let _: i64 = inner
                .bounded("RELEASE_LOCK", async move {
                    invocation.invoke_async(&mut conn).await
                })
                .await?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.query::<String>("PING", redis::cmd("PING")).await.map(|_| ()) })
    }
}
