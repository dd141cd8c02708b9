//! External collaborators: the relational store, the follow relation and
//! the geo index.
//!
//! The cache and feed components only ever see these traits; concrete
//! implementations (SQL repositories, a geo search service) live with the
//! callers that wire the services up.

use async_trait::async_trait;

use crate::models::{Post, Shop, User};

#[async_trait]
pub trait ShopStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<Shop>>;
    /// Order of the result is unspecified; callers reorder as needed.
    async fn find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Shop>>;
    async fn update(&self, shop: &Shop) -> anyhow::Result<()>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert(&self, post: &Post) -> anyhow::Result<()>;
    /// Order of the result is unspecified; callers reorder as needed.
    async fn find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Post>>;
}

#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Ids of users following `user_id` at this instant. Fan-out pushes to
    /// this snapshot only, so a new follower sees just the posts published
    /// after the follow.
    async fn followers_of(&self, user_id: i64) -> anyhow::Result<Vec<i64>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<User>>;
    async fn create_from_phone(&self, phone: &str) -> anyhow::Result<User>;
}

/// Opaque radius index over shops of one type, returning
/// `(shop_id, distance_m)` pairs ordered nearest first.
#[async_trait]
pub trait GeoIndex: Send + Sync {
    async fn radius(
        &self,
        type_id: i64,
        x: f64,
        y: f64,
        radius_m: f64,
        limit: usize,
    ) -> anyhow::Result<Vec<(i64, f64)>>;
}
