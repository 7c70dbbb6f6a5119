//! Redis counter store for `forecourt` rate limiting (companion crate).
//!
//! Each counter key is a sorted set of admission timestamps. One Lua script prunes, counts and
//! records per call, so any number of server instances can share counters without losing
//! atomicity.

use std::time::Duration;

use async_trait::async_trait;
use forecourt::error::StoreError;
use forecourt::rate_limit::{WindowState, WindowStore};
use redis::aio::ConnectionManager;
use redis::Script;

/// KEYS[1] = counter key
/// ARGV = now_millis, window_millis, quota, unique member
const HIT_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local quota = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count < quota then
  redis.call('ZADD', key, now, ARGV[4])
  redis.call('PEXPIRE', key, window)
  return {1, count + 1}
end
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
return {0, tonumber(oldest[2])}
";

#[derive(Clone)]
pub struct RedisWindowStore {
    conn: ConnectionManager,
    script: Script,
}

impl std::fmt::Debug for RedisWindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWindowStore").field("conn", &"<redis::aio::ConnectionManager>").finish()
    }
}

impl RedisWindowStore {
    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, script: Script::new(HIT_SCRIPT) }
    }

    /// Open a managed connection to `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    /// Returns `StoreError::Backend` if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::backend)?;
        let conn = client.get_connection_manager().await.map_err(StoreError::backend)?;
        tracing::info!(target: "forecourt::redis", "connected rate limit counter store");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn hit(
        &self,
        key: &str,
        now_millis: u64,
        window: Duration,
        quota: u32,
    ) -> Result<WindowState, StoreError> {
        let window_millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let member = format!("{now_millis}-{}", uuid::Uuid::new_v4());
        let mut conn = self.conn.clone();

        let (admitted, value): (i64, i64) = self
            .script
            .key(key)
            .arg(now_millis)
            .arg(window_millis)
            .arg(quota)
            .arg(member)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!(target: "forecourt::redis", key = %key, error = %e, "window script failed");
                StoreError::backend(e)
            })?;

        let value = u64::try_from(value).unwrap_or_default();
        if admitted == 1 {
            Ok(WindowState::Admitted { in_window: u32::try_from(value).unwrap_or(u32::MAX) })
        } else {
            Ok(WindowState::Full { oldest_millis: value })
        }
    }
}
