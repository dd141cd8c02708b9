//! Monotonic distributed id generation.

use chrono::Utc;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;

use crate::error::Result;
use crate::keys;

/// Reference instant for the timestamp bits: 2022-01-01T00:00:00Z.
const EPOCH_SECONDS: i64 = 1_640_995_200;
/// Low bits reserved for the per-day sequence.
const SEQUENCE_BITS: u32 = 32;

/// Generates roughly time-ordered 64-bit ids without coordination beyond a
/// shared per-day counter: whole seconds since the reference instant in the
/// high bits, an atomically incremented sequence in the low 32.
///
/// Ids are strictly increasing per prefix, within a process and across
/// processes, as long as wall clocks do not move backward. The counter key
/// embeds the UTC date, so the sequence implicitly restarts at 1 each
/// midnight under an already-larger timestamp.
#[derive(Clone)]
pub struct IdGenerator {
    redis: SharedConnectionManager,
}

impl IdGenerator {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    /// Mint the next id for `prefix`.
    ///
    /// A failed counter increment is fatal to the caller: no id is ever
    /// synthesized without it.
    pub async fn next_id(&self, prefix: &str) -> Result<i64> {
        let now = Utc::now();
        let timestamp = now.timestamp() - EPOCH_SECONDS;
        let date = now.format("%Y:%m:%d").to_string();

        let mut conn = self.redis.lock().await.clone();
        let sequence: i64 = conn.incr(keys::id_counter_key(prefix, &date), 1i64).await?;

        Ok(compose_id(timestamp, sequence))
    }
}

pub(crate) fn compose_id(timestamp: i64, sequence: i64) -> i64 {
    (timestamp << SEQUENCE_BITS) | sequence
}
