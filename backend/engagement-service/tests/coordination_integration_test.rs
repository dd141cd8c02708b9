//! Redis-backed tests for id generation, sign-in bitmaps and sessions.
//!
//! All tests are `#[ignore]` and need a reachable Redis; point `REDIS_URL`
//! at it (defaults to redis://localhost:6379).

use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use engagement_service::config::SessionConfig;
use engagement_service::error::AppError;
use engagement_service::id::IdGenerator;
use engagement_service::keys;
use engagement_service::models::User;
use engagement_service::services::SessionService;
use engagement_service::sign_in::SignInTracker;
use engagement_service::stores::UserStore;
use redis::AsyncCommands;
use redis_utils::{RedisPool, SharedConnectionManager};
use uuid::Uuid;

async fn connect() -> SharedConnectionManager {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let pool = RedisPool::connect(&redis_url)
        .await
        .expect("Failed to connect to Redis");
    pool.manager()
}

fn random_user() -> i64 {
    (Uuid::new_v4().as_u128() % (i64::MAX as u128 / 2)) as i64
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_next_id_is_monotonic_with_dense_sequence() {
    let generator = IdGenerator::new(connect().await);
    let prefix = format!("t{}", Uuid::new_v4().simple());

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(generator.next_id(&prefix).await.unwrap());
    }

    for pair in ids.windows(2) {
        assert!(pair[1] > pair[0], "ids must be strictly increasing");
    }
    // A fresh prefix counts 1..=M in the low 32 bits.
    let sequences: Vec<i64> = ids.iter().map(|id| id & 0xFFFF_FFFF).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_sign_in_streak_counts_back_from_today() {
    let redis = connect().await;
    let tracker = SignInTracker::new(redis.clone());
    let user_id = random_user();

    // Nothing recorded yet: the bitmap key is absent.
    assert_eq!(tracker.current_streak(user_id).await.unwrap(), 0);

    tracker.mark_today(user_id).await.unwrap();
    let today = Utc::now().day();
    if today > 1 {
        // Only today is set, so the streak is exactly 1...
        assert_eq!(tracker.current_streak(user_id).await.unwrap(), 1);

        // ...and extending yesterday's bit extends the run.
        let key = keys::sign_key(user_id, &Utc::now().format("%Y%m").to_string());
        let mut conn = redis.lock().await.clone();
        conn.setbit::<_, ()>(&key, (today - 2) as usize, true)
            .await
            .unwrap();
        assert_eq!(tracker.current_streak(user_id).await.unwrap(), 2);
    } else {
        assert_eq!(tracker.current_streak(user_id).await.unwrap(), 1);
    }

    // Marking twice is idempotent.
    tracker.mark_today(user_id).await.unwrap();
    assert!(tracker.current_streak(user_id).await.unwrap() >= 1);
}

#[derive(Default)]
struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn create_from_phone(&self, phone: &str) -> anyhow::Result<User> {
        let mut users = self.users.lock().unwrap();
        let user = User {
            id: users.len() as i64 + 1,
            phone: phone.to_string(),
            nickname: format!("user_{}", users.len() + 1),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_session_login_flow() {
    let service = SessionService::new(
        connect().await,
        Arc::new(InMemoryUserStore::default()),
        SessionConfig {
            code_ttl: Duration::from_secs(120),
            token_ttl: Duration::from_secs(1800),
        },
    );

    // Phones that do not look like phones are rejected outright.
    assert!(matches!(
        service.send_code("not-a-phone").await,
        Err(AppError::Validation(_))
    ));

    let phone = format!("1{:010}", Uuid::new_v4().as_u128() % 10_000_000_000);
    let code = service.send_code(&phone).await.unwrap();

    assert!(matches!(
        service.login(&phone, "0000000").await,
        Err(AppError::Validation(_))
    ));

    let token = service.login(&phone, &code).await.unwrap();
    let user = service.current_user(&token).await.unwrap();
    assert!(user.is_some());
    assert_eq!(user.unwrap().nickname, "user_1");

    // An unknown token resolves to no session.
    assert!(service.current_user("bogus").await.unwrap().is_none());

    // Logging in again reuses the registered user.
    let code = service.send_code(&phone).await.unwrap();
    let token = service.login(&phone, &code).await.unwrap();
    let user = service.current_user(&token).await.unwrap().unwrap();
    assert_eq!(user.id, 1);
}
