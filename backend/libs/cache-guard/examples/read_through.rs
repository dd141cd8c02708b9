//! End-to-end tour of the three read strategies against a local Redis.
//!
//! Run with: cargo run --example read_through
//! (expects REDIS_URL or redis://localhost:6379)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cache_guard::{CacheClient, CacheGuardConfig, RebuildPool, SourceLoader};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Shop {
    id: i64,
    name: String,
}

/// Stand-in for the relational store.
struct DemoStore;

#[async_trait]
impl SourceLoader<i64, Shop> for DemoStore {
    async fn load(&self, id: &i64) -> anyhow::Result<Option<Shop>> {
        // Pretend the store only knows shop 1.
        Ok((*id == 1).then(|| Shop {
            id: 1,
            name: "Corner Cafe".to_string(),
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cache_guard=debug")
        .init();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let pool = redis_utils::RedisPool::connect(&redis_url).await?;

    let cache = CacheClient::new(
        pool.manager(),
        RebuildPool::new(4, 32),
        CacheGuardConfig::default(),
    );
    let loader = Arc::new(DemoStore);

    // Pass-through: first read loads, second is a cache hit, an unknown id
    // is answered by the null marker after one source miss.
    let shop = cache
        .get_or_load("cache:shop:", &1i64, loader.as_ref(), Duration::from_secs(60))
        .await?;
    println!("pass-through: {:?}", shop);
    let missing: Option<Shop> = cache
        .get_or_load("cache:shop:", &999i64, loader.as_ref(), Duration::from_secs(60))
        .await?;
    println!("unknown shop: {:?}", missing);

    // Logical expiry: seed an expired envelope, watch the stale value come
    // back immediately while the rebuild refreshes it in the background.
    cache
        .write_with_logical_expiry(
            "cache:shop:1",
            &Shop {
                id: 1,
                name: "Corner Cafe (stale)".to_string(),
            },
            Duration::ZERO,
        )
        .await?;
    let stale: Option<Shop> = cache
        .get_with_logical_expiry("cache:shop:", "shop", &1i64, &loader, Duration::from_secs(600))
        .await?;
    println!("served while rebuilding: {:?}", stale);

    sleep(Duration::from_millis(200)).await;
    let fresh: Option<Shop> = cache
        .get_with_logical_expiry("cache:shop:", "shop", &1i64, &loader, Duration::from_secs(600))
        .await?;
    println!("after rebuild: {:?}", fresh);

    Ok(())
}
