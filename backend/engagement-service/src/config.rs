use std::time::Duration;

use cache_guard::CacheGuardConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub shop: ShopConfig,
    pub feed: FeedConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Tuning for the cache layer and its rebuild worker pool.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL on null markers (anti-penetration)
    pub null_ttl: Duration,
    /// TTL on rebuild locks
    pub lock_ttl: Duration,
    /// Backoff between attempts on the mutex read path
    pub mutex_backoff: Duration,
    /// Attempt budget for the mutex read path
    pub mutex_max_retries: u32,
    /// Rebuild worker count
    pub rebuild_workers: usize,
    /// Pending rebuilds accepted before reject-and-log kicks in
    pub rebuild_queue_depth: usize,
}

#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Store-level TTL for pass-through shop entries
    pub cache_ttl: Duration,
    /// Logical-expiry horizon for rebuilt shop entries
    pub rebuild_ttl: Duration,
    /// Page size for nearby-shop queries
    pub nearby_page_size: usize,
    /// Search radius for nearby-shop queries, meters
    pub nearby_radius_m: f64,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Timeline entries returned per page
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of an issued login code
    pub code_ttl: Duration,
    /// Idle lifetime of a session token, refreshed on each access
    pub token_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            cache: CacheConfig {
                null_ttl: secs_var("CACHE_NULL_TTL_SECS", 120)?,
                lock_ttl: secs_var("CACHE_LOCK_TTL_SECS", 10)?,
                mutex_backoff: Duration::from_millis(
                    std::env::var("CACHE_MUTEX_BACKOFF_MS")
                        .unwrap_or_else(|_| "50".to_string())
                        .parse()?,
                ),
                mutex_max_retries: std::env::var("CACHE_MUTEX_MAX_RETRIES")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
                rebuild_workers: std::env::var("CACHE_REBUILD_WORKERS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                rebuild_queue_depth: std::env::var("CACHE_REBUILD_QUEUE_DEPTH")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()?,
            },
            shop: ShopConfig {
                cache_ttl: secs_var("SHOP_CACHE_TTL_SECS", 30 * 60)?,
                rebuild_ttl: secs_var("SHOP_REBUILD_TTL_SECS", 30 * 60)?,
                nearby_page_size: std::env::var("SHOP_NEARBY_PAGE_SIZE")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                nearby_radius_m: std::env::var("SHOP_NEARBY_RADIUS_M")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()?,
            },
            feed: FeedConfig {
                page_size: std::env::var("FEED_PAGE_SIZE")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?,
            },
            session: SessionConfig {
                code_ttl: secs_var("LOGIN_CODE_TTL_SECS", 2 * 60)?,
                token_ttl: secs_var("LOGIN_TOKEN_TTL_SECS", 30 * 60)?,
            },
        })
    }
}

impl CacheConfig {
    /// Project the cache-layer part of the configuration.
    pub fn guard_config(&self) -> CacheGuardConfig {
        CacheGuardConfig {
            null_ttl: self.null_ttl,
            lock_ttl: self.lock_ttl,
            mutex_backoff: self.mutex_backoff,
            mutex_max_retries: self.mutex_max_retries,
        }
    }
}

fn secs_var(name: &str, default: u64) -> Result<Duration, Box<dyn std::error::Error>> {
    let secs = match std::env::var(name) {
        Ok(raw) => raw.parse()?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(secs))
}
