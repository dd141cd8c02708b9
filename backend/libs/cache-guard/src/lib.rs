//! Read-through caching layer with anti-penetration and anti-stampede
//! protection, backed by Redis.
//!
//! # Architecture
//!
//! ```text
//! Request:
//!   1. Read cache:shop:{id}
//!      ├─ value        → deserialize, return
//!      ├─ null marker  → return not-found, source never touched
//!      └─ absent/stale → strategy-specific:
//!
//! get_or_load (anti-penetration):
//!   load from source; miss → cache "" with a short TTL
//!
//! get_with_mutex (blocking anti-stampede):
//!   race for lock:{domain}:{id}; winner loads + fills,
//!   losers back off and re-read (bounded retries)
//!
//! get_with_logical_expiry (non-blocking anti-stampede):
//!   entries carry {"data": ..., "expireTime": ...} and never
//!   physically expire; an expired read returns the stale value and
//!   the lock winner hands the rebuild to the worker pool
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cache_guard::{CacheClient, CacheGuardConfig, RebuildPool, SourceLoader};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct ShopLoader;
//!
//! #[async_trait::async_trait]
//! impl SourceLoader<i64, serde_json::Value> for ShopLoader {
//!     async fn load(&self, id: &i64) -> anyhow::Result<Option<serde_json::Value>> {
//!         // query the relational store
//!         Ok(None)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = redis_utils::RedisPool::connect("redis://localhost:6379").await?;
//!     let cache = CacheClient::new(
//!         pool.manager(),
//!         RebuildPool::new(10, 100),
//!         CacheGuardConfig::default(),
//!     );
//!
//!     let loader = Arc::new(ShopLoader);
//!     let shop = cache
//!         .get_with_logical_expiry("cache:shop:", "shop", &1i64, &loader, Duration::from_secs(1800))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod client;
mod envelope;
mod error;
mod lock;
mod rebuild;

pub use client::{CacheClient, CacheGuardConfig, SourceLoader};
pub use envelope::TimedEnvelope;
pub use error::{CacheError, Result};
pub use lock::{lock_key, LockToken, RedisLock};
pub use rebuild::RebuildPool;
