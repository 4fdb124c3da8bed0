use std::time::Duration;

use redis::{Client, aio::ConnectionManager};
use tokio::time::sleep;
use tracing::warn;

use super::error::{RedisDaoError, RedisResult};

struct RetryPolicy;

impl RetryPolicy {
    const MAX_ATTEMPTS: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 250;

    fn initial_delay() -> Duration {
        Duration::from_millis(Self::INITIAL_DELAY_MS)
    }

    fn next_delay(current: Duration) -> Duration {
        (current * 2).min(Duration::from_secs(5))
    }
}

/// Open a reconnecting connection to Redis, retrying the initial ping with backoff.
pub async fn establish_connection(url: &str) -> RedisResult<ConnectionManager> {
    let client = Client::open(url).map_err(|source| RedisDaoError::InvalidUrl {
        url: url.to_owned(),
        source,
    })?;

    let mut attempts = 0;
    let mut delay = RetryPolicy::initial_delay();

    loop {
        let attempt = async {
            let mut conn = ConnectionManager::new(client.clone()).await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(conn)
        };

        match attempt.await {
            Ok(conn) => return Ok(conn),
            Err(err) => {
                attempts += 1;
                if attempts >= RetryPolicy::MAX_ATTEMPTS {
                    return Err(RedisDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                warn!(attempts, error = %err, "Redis not reachable yet; retrying");
                sleep(delay).await;
                delay = RetryPolicy::next_delay(delay);
            }
        }
    }
}
