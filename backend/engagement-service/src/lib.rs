//! Engagement features for the Plaza backend: shop lookup through the
//! read-through cache, push-based follower feeds, monotonic id generation,
//! monthly sign-in bitmaps and session-adjacent login state.
//!
//! The relational store, the follow relation and the geo index are external
//! collaborators reached through the traits in [`stores`]; everything
//! stateful in this crate lives in Redis.

pub mod config;
pub mod error;
pub mod feed;
pub mod id;
pub mod keys;
pub mod models;
pub mod services;
pub mod sign_in;
pub mod stores;

pub use config::Config;
pub use error::{AppError, Result};
