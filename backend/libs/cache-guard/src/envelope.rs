//! Logical-expiry envelope wrapped around stampede-protected cache entries.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Envelope persisted for the logical-expiry strategy.
///
/// Wire format: `{"data": <value>, "expireTime": "2024-03-01T12:00:00"}`.
/// The field spelling interoperates with entries written by existing
/// deployments. The Redis key carrying an envelope has no store-level TTL;
/// staleness is a property the reader checks against `expire_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEnvelope<T> {
    pub data: T,
    #[serde(rename = "expireTime")]
    pub expire_time: NaiveDateTime,
}

impl<T> TimedEnvelope<T> {
    /// Wrap `data` with a logical expiry `ttl` from now.
    pub fn expiring_in(data: T, ttl: Duration) -> Self {
        let delta = ChronoDuration::from_std(ttl)
            .unwrap_or_else(|_| ChronoDuration::seconds(i64::MAX / 1_000));
        let expire_time = Local::now()
            .naive_local()
            .checked_add_signed(delta)
            .unwrap_or(NaiveDateTime::MAX);
        Self { data, expire_time }
    }

    pub fn is_expired(&self) -> bool {
        self.expire_time <= Local::now().naive_local()
    }
}
