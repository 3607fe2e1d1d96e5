//! Shared failed-login counter backed by Redis.
//!
//! One key per username holds the failure count; its TTL is set on the
//! first failure, so the lockout window is anchored there exactly like the
//! in-memory tracker. Redis errors fail open: a login is never refused
//! because the counter is unreachable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use tracing::warn;

use rigstock_auth::{LockoutPolicy, LoginAttemptStore};

const DEFAULT_KEY_PREFIX: &str = "rigstock:login_failures";

#[derive(Debug, thiserror::Error)]
pub enum RedisLockoutError {
    #[error("Redis connection error: {0}")]
    Connection(String),
}

#[derive(Clone)]
pub struct RedisLoginAttempts {
    conn: MultiplexedConnection,
    policy: LockoutPolicy,
    key_prefix: String,
}

impl std::fmt::Debug for RedisLoginAttempts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLoginAttempts")
            .field("policy", &self.policy)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisLoginAttempts {
    pub async fn connect(redis_url: &str, policy: LockoutPolicy) -> Result<Self, RedisLockoutError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| RedisLockoutError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisLockoutError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            policy,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    fn key(&self, username: &str) -> String {
        format!("{}:{}", self.key_prefix, username)
    }
}

#[async_trait]
impl LoginAttemptStore for RedisLoginAttempts {
    async fn is_locked(&self, username: &str, _now: DateTime<Utc>) -> bool {
        let mut conn = self.conn.clone();
        let count: redis::RedisResult<Option<u32>> =
            redis::cmd("GET").arg(self.key(username)).query_async(&mut conn).await;
        match count {
            Ok(count) => count.is_some_and(|c| c >= self.policy.max_attempts),
            Err(e) => {
                warn!(error = %e, "lockout counter unavailable");
                false
            }
        }
    }

    async fn record_failure(&self, username: &str, _now: DateTime<Utc>) -> u32 {
        let key = self.key(username);
        let mut conn = self.conn.clone();
        let count: redis::RedisResult<u32> = redis::cmd("INCR").arg(&key).query_async(&mut conn).await;
        let count = match count {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "lockout counter unavailable");
                return 0;
            }
        };
        if count == 1 {
            let expire: redis::RedisResult<i64> = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(self.policy.window.num_seconds())
                .query_async(&mut conn)
                .await;
            if let Err(e) = expire {
                warn!(error = %e, "failed to set lockout window");
            }
        }
        count
    }

    async fn clear(&self, username: &str) {
        let mut conn = self.conn.clone();
        let deleted: redis::RedisResult<i64> = redis::cmd("DEL").arg(self.key(username)).query_async(&mut conn).await;
        if let Err(e) = deleted {
            warn!(error = %e, "failed to clear lockout counter");
        }
    }
}
