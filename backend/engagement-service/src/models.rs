use serde::{Deserialize, Serialize};

/// A shop record from the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub type_id: i64,
    pub address: String,
    pub x: f64,
    pub y: f64,
    pub avg_price: Option<i64>,
    pub sold: u32,
    pub comments: u32,
    pub score: u32,
    /// Filled in by nearby queries, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

/// A published note, pushed into follower timelines at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub created_at_ms: i64,
}

/// Draft of a post before an id has been minted.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

/// A user record from the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub phone: String,
    pub nickname: String,
}

/// Slimmed-down user kept in the session hash. The phone number stays out
/// of Redis.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSummary {
    pub id: i64,
    pub nickname: String,
}
