//! Short-lived distributed mutual exclusion backed by Redis.

use std::fmt::Display;
use std::time::Duration;

use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Compare-and-delete: only the holder that stored the token may release.
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Build the lock key for an entity: `lock:<domain>:<id>`.
pub fn lock_key(domain: &str, id: &impl Display) -> String {
    format!("lock:{}:{}", domain, id)
}

/// Token proving ownership of an acquired lock.
///
/// Release requires the token issued at acquire time, so a slow holder
/// whose lock TTL already lapsed cannot delete a lock that has since been
/// re-acquired under the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Distributed lock keyed by string.
///
/// Acquisition is a single atomic `SET key token NX EX ttl`; release is a
/// Lua compare-and-delete. Not reentrant, not fair, no queueing: callers
/// that lose the race either skip the protected work or back off and retry.
#[derive(Clone)]
pub struct RedisLock {
    redis: SharedConnectionManager,
    ttl: Duration,
}

impl RedisLock {
    /// `ttl` bounds how long an orphaned lock outlives a crashed holder.
    /// It does not bound the protected work itself.
    pub fn new(redis: SharedConnectionManager, ttl: Duration) -> Self {
        Self { redis, ttl }
    }

    /// Try to take the lock. `None` means another holder has it, which is
    /// an expected outcome, not an error.
    pub async fn try_acquire(&self, key: &str) -> Result<Option<LockToken>> {
        let token = LockToken::generate();
        let mut conn = self.redis.lock().await.clone();

        let was_set: bool = conn
            .set_options(
                key,
                token.as_str(),
                redis::SetOptions::default()
                    .conditional_set(redis::ExistenceCheck::NX)
                    .with_expiration(redis::SetExpiry::EX(self.ttl.as_secs() as usize)),
            )
            .await?;

        if was_set {
            debug!(key = %key, "lock acquired");
            Ok(Some(token))
        } else {
            debug!(key = %key, "lock busy");
            Ok(None)
        }
    }

    /// Release the lock if `token` still owns it.
    ///
    /// Returns false when the key now holds a different token (the lock
    /// expired and was re-acquired); the stale release leaves the new
    /// holder's lock intact.
    pub async fn release(&self, key: &str, token: &LockToken) -> Result<bool> {
        let mut conn = self.redis.lock().await.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            warn!(key = %key, "stale lock release rejected");
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_format() {
        assert_eq!(lock_key("shop", &42), "lock:shop:42");
        assert_eq!(lock_key("order", &"7"), "lock:order:7");
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = LockToken::generate();
        let b = LockToken::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
