//! Redis-backed tests for feed fan-out and cursor pagination.
//!
//! All tests are `#[ignore]` and need a reachable Redis; point `REDIS_URL`
//! at it (defaults to redis://localhost:6379).

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;

use async_trait::async_trait;
use engagement_service::config::FeedConfig;
use engagement_service::feed::FeedService;
use engagement_service::id::IdGenerator;
use engagement_service::keys;
use engagement_service::models::{NewPost, Post};
use engagement_service::stores::{FollowStore, PostStore};
use redis::AsyncCommands;
use redis_utils::{RedisPool, SharedConnectionManager};
use uuid::Uuid;

#[derive(Default)]
struct InMemoryPostStore {
    posts: Mutex<HashMap<i64, Post>>,
}

impl InMemoryPostStore {
    fn with_posts(posts: impl IntoIterator<Item = Post>) -> Self {
        Self {
            posts: Mutex::new(posts.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    fn contains(&self, id: i64) -> bool {
        self.posts.lock().unwrap().contains_key(&id)
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert(&self, post: &Post) -> anyhow::Result<()> {
        self.posts.lock().unwrap().insert(post.id, post.clone());
        Ok(())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<Post>> {
        let posts = self.posts.lock().unwrap();
        Ok(ids.iter().filter_map(|id| posts.get(id).cloned()).collect())
    }
}

struct StaticFollowStore {
    followers: Vec<i64>,
}

#[async_trait]
impl FollowStore for StaticFollowStore {
    async fn followers_of(&self, _user_id: i64) -> anyhow::Result<Vec<i64>> {
        Ok(self.followers.clone())
    }
}

async fn connect() -> SharedConnectionManager {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let pool = RedisPool::connect(&redis_url)
        .await
        .expect("Failed to connect to Redis");
    pool.manager()
}

fn fake_post(id: i64, author_id: i64, created_at_ms: i64) -> Post {
    Post {
        id,
        author_id,
        title: format!("post {}", id),
        content: "body".to_string(),
        created_at_ms,
    }
}

fn random_user() -> i64 {
    // Keep ids positive and far away from other test runs.
    (Uuid::new_v4().as_u128() % (i64::MAX as u128 / 2)) as i64
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_publish_fans_out_to_current_followers() {
    let redis = connect().await;
    let follower_a = random_user();
    let follower_b = random_user();
    let outsider = random_user();

    let posts = Arc::new(InMemoryPostStore::default());
    let service = FeedService::new(
        redis.clone(),
        IdGenerator::new(redis.clone()),
        Arc::clone(&posts) as Arc<dyn PostStore>,
        Arc::new(StaticFollowStore {
            followers: vec![follower_a, follower_b],
        }),
        FeedConfig { page_size: 10 },
    );

    let post_id = service
        .publish(
            random_user(),
            NewPost {
                title: "opening day".to_string(),
                content: "come by".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(posts.contains(post_id));

    // Both followers received the entry, the outsider did not.
    let mut conn = redis.lock().await.clone();
    for follower in [follower_a, follower_b] {
        let score: Option<f64> = conn
            .zscore(keys::feed_key(follower), post_id)
            .await
            .unwrap();
        assert!(score.is_some(), "follower {} missed the push", follower);
    }
    let score: Option<f64> = conn
        .zscore(keys::feed_key(outsider), post_id)
        .await
        .unwrap();
    assert!(score.is_none());

    // The follower's timeline read resolves the full post.
    let page = service
        .read_timeline(follower_a, i64::MAX, 0)
        .await
        .unwrap();
    assert_eq!(page.posts.len(), 1);
    assert_eq!(page.posts[0].id, post_id);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_timeline_pagination_handles_score_ties() {
    let redis = connect().await;
    let reader = random_user();
    let author = random_user();

    // Seed the timeline directly: five entries with scores 50,50,50,40,30.
    // For equal scores Redis orders members reverse-lexicographically, so
    // the score-50 group reads back as 3, 2, 1.
    let base = 1_700_000_000_000i64;
    let scored = [(1i64, 50i64), (2, 50), (3, 50), (4, 40), (5, 30)];
    {
        let mut conn = redis.lock().await.clone();
        for (member, score) in scored {
            conn.zadd::<_, _, _, ()>(keys::feed_key(reader), member, base + score)
                .await
                .unwrap();
        }
    }

    let posts = Arc::new(InMemoryPostStore::with_posts(
        scored
            .iter()
            .map(|(id, score)| fake_post(*id, author, base + score)),
    ));
    let service = FeedService::new(
        redis.clone(),
        IdGenerator::new(redis),
        posts,
        Arc::new(StaticFollowStore { followers: vec![] }),
        FeedConfig { page_size: 2 },
    );

    let page = service.read_timeline(reader, i64::MAX, 0).await.unwrap();
    assert_eq!(ids(&page.posts), vec![3, 2]);
    assert_eq!(page.next_max_score, base + 50);
    assert_eq!(page.next_offset, 2);

    // The boundary score ties the previous minimum: the two entries
    // already served are skipped, nothing is lost or repeated.
    let page = service
        .read_timeline(reader, page.next_max_score, page.next_offset)
        .await
        .unwrap();
    assert_eq!(ids(&page.posts), vec![1, 4]);
    assert_eq!(page.next_max_score, base + 40);
    assert_eq!(page.next_offset, 1);

    let page = service
        .read_timeline(reader, page.next_max_score, page.next_offset)
        .await
        .unwrap();
    assert_eq!(ids(&page.posts), vec![5]);
    assert_eq!(page.next_max_score, base + 30);
    assert_eq!(page.next_offset, 1);

    let page = service
        .read_timeline(reader, page.next_max_score, page.next_offset)
        .await
        .unwrap();
    assert!(page.posts.is_empty());
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_empty_timeline_reads_empty() {
    let redis = connect().await;
    let service = FeedService::new(
        redis.clone(),
        IdGenerator::new(redis),
        Arc::new(InMemoryPostStore::default()),
        Arc::new(StaticFollowStore { followers: vec![] }),
        FeedConfig { page_size: 2 },
    );

    let page = service
        .read_timeline(random_user(), i64::MAX, 0)
        .await
        .unwrap();
    assert!(page.posts.is_empty());
    assert_eq!(page.next_max_score, 0);
    assert_eq!(page.next_offset, 0);
}

fn ids(posts: &[Post]) -> Vec<i64> {
    posts.iter().map(|p| p.id).collect()
}
