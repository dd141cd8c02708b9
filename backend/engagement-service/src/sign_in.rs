//! Monthly sign-in bitmaps and streak counting.

use chrono::{Datelike, Utc};
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::debug;

use crate::error::Result;
use crate::keys;

/// One bit per calendar day of the current month, per user. Bits are only
/// ever set; an absent key means no sign-ins this month.
#[derive(Clone)]
pub struct SignInTracker {
    redis: SharedConnectionManager,
}

impl SignInTracker {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    /// Record today's sign-in. Idempotent.
    pub async fn mark_today(&self, user_id: i64) -> Result<()> {
        let now = Utc::now();
        let key = keys::sign_key(user_id, &now.format("%Y%m").to_string());
        let day = now.day() as usize;

        let mut conn = self.redis.lock().await.clone();
        conn.setbit::<_, ()>(&key, day - 1, true).await?;

        debug!(user_id, day, "sign-in recorded");
        Ok(())
    }

    /// Length of the unbroken sign-in run ending today.
    ///
    /// Reads the month's bits up to today as one unsigned integer and
    /// counts consecutive set bits from the most recent day backward. No
    /// sign-in today means a streak of 0 regardless of earlier days.
    pub async fn current_streak(&self, user_id: i64) -> Result<u32> {
        let now = Utc::now();
        let key = keys::sign_key(user_id, &now.format("%Y%m").to_string());
        let day = now.day();

        let mut conn = self.redis.lock().await.clone();
        let fields: Vec<u64> = redis::cmd("BITFIELD")
            .arg(&key)
            .arg("GET")
            .arg(format!("u{}", day))
            .arg(0)
            .query_async(&mut conn)
            .await?;

        Ok(fields.first().map(|bits| trailing_streak(*bits)).unwrap_or(0))
    }
}

/// Consecutive set bits starting at the least-significant (most recent)
/// position.
fn trailing_streak(bits: u64) -> u32 {
    bits.trailing_ones()
}
