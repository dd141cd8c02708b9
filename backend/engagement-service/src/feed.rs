//! Push-based follower feed: fan-out-on-write plus cursor-paginated reads.

use std::sync::Arc;

use chrono::Utc;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::Result;
use crate::id::IdGenerator;
use crate::keys;
use crate::models::{NewPost, Post};
use crate::stores::{FollowStore, PostStore};

/// Id counter namespace for minted post ids.
const POST_ID_PREFIX: &str = "post";

pub struct FeedService {
    redis: SharedConnectionManager,
    ids: IdGenerator,
    posts: Arc<dyn PostStore>,
    follows: Arc<dyn FollowStore>,
    config: FeedConfig,
}

/// One page of a timeline plus the cursor for the next call.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePage {
    /// Posts in descending publish order
    pub posts: Vec<Post>,
    /// Pass back as `max_score` on the next call
    pub next_max_score: i64,
    /// Entries tying `next_max_score` already consumed; pass back as
    /// `offset` on the next call
    pub next_offset: usize,
}

impl TimelinePage {
    fn empty() -> Self {
        Self {
            posts: Vec::new(),
            next_max_score: 0,
            next_offset: 0,
        }
    }
}

impl FeedService {
    pub fn new(
        redis: SharedConnectionManager,
        ids: IdGenerator,
        posts: Arc<dyn PostStore>,
        follows: Arc<dyn FollowStore>,
        config: FeedConfig,
    ) -> Self {
        Self {
            redis,
            ids,
            posts,
            follows,
            config,
        }
    }

    /// Persist a new post and push it into every current follower's
    /// timeline.
    ///
    /// Cost is O(follower count) by design: writes pay for cheap reads.
    /// Once the post itself is persisted, per-follower push failures are
    /// logged and skipped; a crash mid-fan-out leaves partial delivery and
    /// is not retried.
    pub async fn publish(&self, author_id: i64, draft: NewPost) -> Result<i64> {
        let id = self.ids.next_id(POST_ID_PREFIX).await?;
        let now_ms = Utc::now().timestamp_millis();
        let post = Post {
            id,
            author_id,
            title: draft.title,
            content: draft.content,
            created_at_ms: now_ms,
        };
        self.posts.insert(&post).await?;

        let followers = self.follows.followers_of(author_id).await?;
        for follower in &followers {
            let key = keys::feed_key(*follower);
            let mut conn = self.redis.lock().await.clone();
            if let Err(e) = conn.zadd::<_, _, _, ()>(&key, id, now_ms).await {
                warn!(post_id = id, follower, error = %e, "feed push failed");
            }
        }

        debug!(post_id = id, fanout = followers.len(), "post published");
        Ok(id)
    }

    /// Read one page of the caller's timeline, newest first.
    ///
    /// `max_score` is the inclusive upper bound carried over from the
    /// previous page (`i64::MAX` for the first call); `offset` skips the
    /// entries at exactly `max_score` that the previous page already
    /// returned. Entries sharing a timestamp are therefore neither skipped
    /// nor duplicated across page boundaries.
    pub async fn read_timeline(
        &self,
        user_id: i64,
        max_score: i64,
        offset: usize,
    ) -> Result<TimelinePage> {
        let key = keys::feed_key(user_id);
        let raw: Vec<(String, f64)> = {
            let mut conn = self.redis.lock().await.clone();
            conn.zrevrangebyscore_limit_withscores(
                &key,
                max_score,
                0,
                offset as isize,
                self.config.page_size as isize,
            )
            .await?
        };
        if raw.is_empty() {
            return Ok(TimelinePage::empty());
        }

        let entries: Vec<(i64, i64)> = raw
            .iter()
            .filter_map(|(member, score)| member.parse().ok().map(|id| (id, *score as i64)))
            .collect();
        let ids: Vec<i64> = entries.iter().map(|(id, _)| *id).collect();
        let (next_max_score, next_offset) = scroll_cursor(&entries);

        let mut posts = self.posts.find_by_ids(&ids).await?;
        // The store gives no order guarantee; restore timeline order.
        posts.sort_by_key(|p| ids.iter().position(|id| *id == p.id).unwrap_or(usize::MAX));

        Ok(TimelinePage {
            posts,
            next_max_score,
            next_offset,
        })
    }
}

/// Cursor over a page of `(id, score)` entries: the minimum score seen and
/// how many trailing entries share it.
///
/// Plain offset pagination would skip or duplicate entries whenever two
/// timeline entries share a timestamp; counting the ties at the boundary
/// score lets the next call skip exactly the entries it has already seen.
fn scroll_cursor(entries: &[(i64, i64)]) -> (i64, usize) {
    let mut min_score = 0i64;
    let mut ties = 1usize;
    for (_, score) in entries {
        if *score == min_score {
            ties += 1;
        } else {
            min_score = *score;
            ties = 1;
        }
    }
    (min_score, ties)
}
