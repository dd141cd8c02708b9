//! Shop lookup through the cache layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cache_guard::{CacheClient, SourceLoader};
use tracing::info;

use crate::config::ShopConfig;
use crate::error::{AppError, Result};
use crate::keys;
use crate::models::Shop;
use crate::stores::{GeoIndex, ShopStore};

/// Adapter exposing the relational store as the cache layer's loader.
struct ShopLoader {
    store: Arc<dyn ShopStore>,
}

#[async_trait]
impl SourceLoader<i64, Shop> for ShopLoader {
    async fn load(&self, id: &i64) -> anyhow::Result<Option<Shop>> {
        self.store.find_by_id(*id).await
    }
}

pub struct ShopService {
    cache: Arc<CacheClient>,
    loader: Arc<ShopLoader>,
    store: Arc<dyn ShopStore>,
    geo: Arc<dyn GeoIndex>,
    config: ShopConfig,
}

impl ShopService {
    pub fn new(
        cache: Arc<CacheClient>,
        store: Arc<dyn ShopStore>,
        geo: Arc<dyn GeoIndex>,
        config: ShopConfig,
    ) -> Self {
        let loader = Arc::new(ShopLoader {
            store: Arc::clone(&store),
        });
        Self {
            cache,
            loader,
            store,
            geo,
            config,
        }
    }

    /// Logical-expiry read, the default strategy for hot shops.
    ///
    /// Assumes the entry was seeded with [`warm_shop`](Self::warm_shop); a
    /// cold key reads as not-found.
    pub async fn get_shop(&self, id: i64) -> Result<Shop> {
        self.cache
            .get_with_logical_expiry(
                keys::SHOP_CACHE_PREFIX,
                keys::SHOP_LOCK_DOMAIN,
                &id,
                &self.loader,
                self.config.rebuild_ttl,
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shop {}", id)))
    }

    /// Pass-through read with null-marker anti-penetration.
    pub async fn get_shop_pass_through(&self, id: i64) -> Result<Shop> {
        self.cache
            .get_or_load(
                keys::SHOP_CACHE_PREFIX,
                &id,
                self.loader.as_ref(),
                self.config.cache_ttl,
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shop {}", id)))
    }

    /// Mutex-guarded read: cold misses serialize on a per-shop lock.
    pub async fn get_shop_mutex(&self, id: i64) -> Result<Shop> {
        self.cache
            .get_with_mutex(
                keys::SHOP_CACHE_PREFIX,
                keys::SHOP_LOCK_DOMAIN,
                &id,
                self.loader.as_ref(),
                self.config.cache_ttl,
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shop {}", id)))
    }

    /// Update the store first, then drop the cached entry. Delete-on-write
    /// keeps the cache best-effort consistent without coupling the write to
    /// a rebuild.
    pub async fn update_shop(&self, shop: &Shop) -> Result<()> {
        if shop.id <= 0 {
            return Err(AppError::Validation("shop id is required".to_string()));
        }
        self.store.update(shop).await?;
        self.cache
            .invalidate(&format!("{}{}", keys::SHOP_CACHE_PREFIX, shop.id))
            .await?;
        Ok(())
    }

    /// Seed the logical-expiry envelope for `id` ahead of traffic.
    pub async fn warm_shop(&self, id: i64, ttl: Duration) -> Result<()> {
        let shop = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("shop {}", id)))?;
        self.cache
            .write_with_logical_expiry(&format!("{}{}", keys::SHOP_CACHE_PREFIX, id), &shop, ttl)
            .await?;
        info!(shop_id = id, "shop cache warmed");
        Ok(())
    }

    /// One page of shops of `type_id`, ordered by distance from `(x, y)`.
    ///
    /// The geo index is an opaque external collaborator; it hands back
    /// `(id, distance)` pairs nearest first and this method slices the
    /// requested page out of them.
    pub async fn shops_nearby(&self, type_id: i64, x: f64, y: f64, page: usize) -> Result<Vec<Shop>> {
        let page = page.max(1);
        let from = (page - 1) * self.config.nearby_page_size;
        let end = page * self.config.nearby_page_size;

        let hits = self
            .geo
            .radius(type_id, x, y, self.config.nearby_radius_m, end)
            .await?;
        if hits.len() <= from {
            return Ok(Vec::new());
        }

        let window = &hits[from..];
        let ids: Vec<i64> = window.iter().map(|(id, _)| *id).collect();

        let mut shops = self.store.find_by_ids(&ids).await?;
        shops.sort_by_key(|s| ids.iter().position(|id| *id == s.id).unwrap_or(usize::MAX));
        for shop in &mut shops {
            shop.distance_m = window
                .iter()
                .find(|(id, _)| *id == shop.id)
                .map(|(_, distance)| *distance);
        }
        Ok(shops)
    }
}
