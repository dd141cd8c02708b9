//! Read-through cache strategies with anti-penetration and anti-stampede
//! protection.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::envelope::TimedEnvelope;
use crate::error::{CacheError, Result};
use crate::lock::{lock_key, LockToken, RedisLock};
use crate::rebuild::RebuildPool;

/// Source-of-truth loader supplied by the caller per entity type.
///
/// Must be idempotent and safe to call concurrently for different ids and,
/// rarely, for the same id: two rebuilds can race when one outlives the
/// lock TTL.
#[async_trait]
pub trait SourceLoader<K, V>: Send + Sync {
    async fn load(&self, id: &K) -> anyhow::Result<Option<V>>;
}

/// Tuning for the cache strategies.
#[derive(Debug, Clone)]
pub struct CacheGuardConfig {
    /// TTL on null markers written after a confirmed source miss
    pub null_ttl: Duration,
    /// TTL on rebuild locks; bounds orphaned locks, not rebuild duration
    pub lock_ttl: Duration,
    /// Backoff between attempts on the mutex read path
    pub mutex_backoff: Duration,
    /// Attempt budget for the mutex read path
    pub mutex_max_retries: u32,
}

impl Default for CacheGuardConfig {
    fn default() -> Self {
        Self {
            null_ttl: Duration::from_secs(2 * 60),
            lock_ttl: Duration::from_secs(10),
            mutex_backoff: Duration::from_millis(50),
            mutex_max_retries: 100,
        }
    }
}

/// Read-through cache over the shared Redis store.
///
/// Three read strategies with different staleness/latency trade-offs, all
/// parameterized by a key prefix, an id and a [`SourceLoader`]:
///
/// - [`get_or_load`](Self::get_or_load): plain pass-through. A confirmed
///   source miss is cached as an empty null marker with a short TTL, so
///   repeated lookups of a nonexistent id cannot hammer the source.
/// - [`get_with_mutex`](Self::get_with_mutex): a miss takes a per-id lock
///   and loads synchronously; losers back off and re-read. Strong recency,
///   blocks under contention.
/// - [`get_with_logical_expiry`](Self::get_with_logical_expiry): entries
///   never physically expire; an expired read returns the stale value and
///   hands the rebuild to the worker pool. Never blocks, may serve stale
///   data until the rebuild lands.
pub struct CacheClient {
    redis: SharedConnectionManager,
    lock: RedisLock,
    rebuild: RebuildPool,
    config: CacheGuardConfig,
}

/// Outcome of a raw cache read.
enum RawRead<V> {
    /// Deserialized cached value
    Hit(V),
    /// Empty sentinel: the source is known not to have this id
    NullMarker,
    /// Key not cached; the source must be consulted
    Absent,
}

impl CacheClient {
    pub fn new(
        redis: SharedConnectionManager,
        rebuild: RebuildPool,
        config: CacheGuardConfig,
    ) -> Self {
        let lock = RedisLock::new(redis.clone(), config.lock_ttl);
        Self {
            redis,
            lock,
            rebuild,
            config,
        }
    }

    /// Unconditional set with a store-level TTL.
    pub async fn write<V: Serialize>(&self, key: &str, value: &V, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.redis.lock().await.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs())
            .arg(json)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Unconditional set of a logical-expiry envelope. The key never
    /// physically expires; readers judge staleness by the envelope.
    pub async fn write_with_logical_expiry<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl: Duration,
    ) -> Result<()> {
        let envelope = TimedEnvelope::expiring_in(value, ttl);
        let json = serde_json::to_string(&envelope)?;
        let mut conn = self.redis.lock().await.clone();
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }

    /// Drop a cached entry (delete-on-write invalidation).
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.lock().await.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Pass-through read with null-marker anti-penetration.
    ///
    /// An id absent from both cache and source is cached as an empty value
    /// for [`CacheGuardConfig::null_ttl`], so the source sees at most one
    /// lookup for it per TTL window.
    pub async fn get_or_load<K, V, L>(
        &self,
        prefix: &str,
        id: &K,
        loader: &L,
        ttl: Duration,
    ) -> Result<Option<V>>
    where
        K: Display + Sync,
        V: Serialize + DeserializeOwned,
        L: SourceLoader<K, V> + ?Sized,
    {
        let key = format!("{}{}", prefix, id);

        match self.read_raw(&key).await? {
            RawRead::Hit(value) => return Ok(Some(value)),
            RawRead::NullMarker => return Ok(None),
            RawRead::Absent => {}
        }

        self.load_and_fill(&key, id, loader, ttl).await
    }

    /// Stampede protection by blocking retry.
    ///
    /// On a miss, the caller races for the per-id rebuild lock; the winner
    /// loads and fills the cache, losers sleep a fixed backoff and re-read
    /// from the top. The loop is bounded: once the retry budget is spent
    /// the read fails with [`CacheError::LockContended`].
    pub async fn get_with_mutex<K, V, L>(
        &self,
        prefix: &str,
        lock_domain: &str,
        id: &K,
        loader: &L,
        ttl: Duration,
    ) -> Result<Option<V>>
    where
        K: Display + Sync,
        V: Serialize + DeserializeOwned,
        L: SourceLoader<K, V> + ?Sized,
    {
        let key = format!("{}{}", prefix, id);
        let lock_key = lock_key(lock_domain, id);
        let mut attempts = 0u32;

        loop {
            match self.read_raw(&key).await? {
                RawRead::Hit(value) => return Ok(Some(value)),
                RawRead::NullMarker => return Ok(None),
                RawRead::Absent => {}
            }

            let Some(token) = self.lock.try_acquire(&lock_key).await? else {
                attempts += 1;
                if attempts >= self.config.mutex_max_retries {
                    return Err(CacheError::LockContended {
                        key: lock_key,
                        attempts,
                    });
                }
                sleep(self.config.mutex_backoff).await;
                continue;
            };

            let result = self.load_and_fill(&key, id, loader, ttl).await;
            if let Err(e) = self.lock.release(&lock_key, &token).await {
                warn!(key = %lock_key, error = %e, "failed to release rebuild lock");
            }
            return result;
        }
    }

    /// Logical-expiry read with asynchronous rebuild.
    ///
    /// Assumes pre-warmed entries: a missing key is a plain not-found and
    /// never triggers a synchronous load. An expired entry is returned
    /// as-is; the reader that wins the per-id lock schedules the rebuild on
    /// the worker pool, everyone else proceeds with the stale value.
    pub async fn get_with_logical_expiry<K, V, L>(
        &self,
        prefix: &str,
        lock_domain: &str,
        id: &K,
        loader: &Arc<L>,
        rebuild_ttl: Duration,
    ) -> Result<Option<V>>
    where
        K: Display + Clone + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + 'static,
        L: SourceLoader<K, V> + ?Sized + 'static,
    {
        let key = format!("{}{}", prefix, id);

        let cached: Option<String> = {
            let mut conn = self.redis.lock().await.clone();
            conn.get(&key).await?
        };
        let Some(json) = cached else {
            return Ok(None);
        };

        let envelope: TimedEnvelope<V> = serde_json::from_str(&json)?;
        if !envelope.is_expired() {
            return Ok(Some(envelope.data));
        }

        let lock_key = lock_key(lock_domain, id);
        if let Some(token) = self.lock.try_acquire(&lock_key).await? {
            let submitted = self.rebuild.try_submit(rebuild_entry::<K, V, L>(
                self.redis.clone(),
                self.lock.clone(),
                Arc::clone(loader),
                id.clone(),
                key,
                lock_key.clone(),
                token.clone(),
                rebuild_ttl,
            ));
            if !submitted {
                // Give the lock back now instead of leaving the entry
                // rebuild-blocked until the lock TTL lapses.
                if let Err(e) = self.lock.release(&lock_key, &token).await {
                    warn!(key = %lock_key, error = %e, "failed to release rebuild lock");
                }
            }
        }

        // Losing the lock race just means someone else is rebuilding.
        Ok(Some(envelope.data))
    }

    /// Raw cache read distinguishing a cached value, a null marker
    /// (confirmed prior miss, do not touch the source) and a key that was
    /// never cached at all.
    async fn read_raw<V: DeserializeOwned>(&self, key: &str) -> Result<RawRead<V>> {
        let cached: Option<String> = {
            let mut conn = self.redis.lock().await.clone();
            conn.get(key).await?
        };

        match cached.as_deref() {
            Some(json) if !json.is_empty() => Ok(RawRead::Hit(serde_json::from_str(json)?)),
            Some(_) => {
                debug!(key = %key, "null marker hit, source skipped");
                Ok(RawRead::NullMarker)
            }
            None => Ok(RawRead::Absent),
        }
    }

    async fn load_and_fill<K, V, L>(
        &self,
        key: &str,
        id: &K,
        loader: &L,
        ttl: Duration,
    ) -> Result<Option<V>>
    where
        K: Display + Sync,
        V: Serialize + DeserializeOwned,
        L: SourceLoader<K, V> + ?Sized,
    {
        match loader.load(id).await? {
            Some(value) => {
                self.write(key, &value, ttl).await?;
                Ok(Some(value))
            }
            None => {
                let mut conn = self.redis.lock().await.clone();
                redis::cmd("SETEX")
                    .arg(key)
                    .arg(self.config.null_ttl.as_secs())
                    .arg("")
                    .query_async::<_, ()>(&mut conn)
                    .await?;
                debug!(key = %key, "source miss, null marker cached");
                Ok(None)
            }
        }
    }
}

/// Background rebuild of one logically expired entry.
///
/// Fire-and-forget from the triggering read's point of view: failures are
/// logged and degrade to continued staleness, never to an error surfaced to
/// a caller. The lock is released in every outcome.
#[allow(clippy::too_many_arguments)]
async fn rebuild_entry<K, V, L>(
    redis: SharedConnectionManager,
    lock: RedisLock,
    loader: Arc<L>,
    id: K,
    key: String,
    lock_key: String,
    token: LockToken,
    rebuild_ttl: Duration,
) where
    K: Display + Send + Sync,
    V: Serialize + Send,
    L: SourceLoader<K, V> + ?Sized,
{
    let outcome: Result<()> = async {
        match loader.load(&id).await? {
            Some(value) => {
                let envelope = TimedEnvelope::expiring_in(value, rebuild_ttl);
                let json = serde_json::to_string(&envelope)?;
                let mut conn = redis.lock().await.clone();
                conn.set::<_, _, ()>(&key, json).await?;
                debug!(key = %key, "cache entry rebuilt");
            }
            None => {
                // The entity vanished from the source; drop the stale entry
                // so readers see not-found instead of resurrected data.
                let mut conn = redis.lock().await.clone();
                conn.del::<_, ()>(&key).await?;
                debug!(key = %key, "entity gone from source, cache entry dropped");
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = outcome {
        error!(key = %key, error = %e, "cache rebuild failed");
    }

    if let Err(e) = lock.release(&lock_key, &token).await {
        warn!(key = %lock_key, error = %e, "failed to release rebuild lock");
    }
}
