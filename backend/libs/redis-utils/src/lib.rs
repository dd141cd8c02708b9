use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Shared Redis connection manager guarded by a Tokio mutex.
///
/// Call sites take a cheap clone of the inner manager and run commands on
/// the clone, so the mutex is held only for the duration of the clone:
///
/// ```ignore
/// let mut conn = redis.lock().await.clone();
/// let value: Option<String> = conn.get("some:key").await?;
/// ```
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool shared by every component that talks to the
/// key-value store: the cache layer, the distributed lock, the ID counter,
/// feed timelines and sign-in bitmaps.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    /// Connect and build the shared connection manager.
    ///
    /// The manager transparently reconnects on connection loss, so a single
    /// pool instance is created at startup and cloned into each component.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("failed to construct Redis client")?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;

        info!("Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }

    /// Ping Redis to check connection health.
    ///
    /// Intended to be called periodically from a background task so stale
    /// connections are noticed before a request hits them.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.lock().await.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                e
            })
            .context("Redis health check failed")?;
        Ok(())
    }
}
