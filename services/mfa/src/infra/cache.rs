use chrono::{Duration, Utc};
use deadpool_redis::Pool;
use uuid::Uuid;

use crate::domain::repository::AttemptCounter;
use crate::error::MfaError;

/// Redis-backed attempt counter. Counts survive process restarts and are
/// shared across instances, unlike a per-request in-memory map.
#[derive(Clone)]
pub struct RedisAttemptCounter {
    pub pool: Pool,
}

impl AttemptCounter for RedisAttemptCounter {
    /// Sorted-set sliding window: drop entries older than the window, add
    /// this attempt, count. The pipeline is atomic so check-and-record is
    /// one unit even under concurrent callers.
    async fn record_and_count(&self, key: &str, window: Duration) -> Result<u64, MfaError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| MfaError::Internal(e.into()))?;

        let now_ms = Utc::now().timestamp_millis();
        let cutoff = now_ms - window.num_milliseconds();
        let member = format!("{now_ms}:{}", Uuid::new_v4());
        let ttl_secs = (window.num_seconds() + 1).max(1);

        let (_, _, count, _): (i64, i64, u64, i64) = deadpool_redis::redis::pipe()
            .atomic()
            .zrembyscore(key, i64::MIN, cutoff)
            .zadd(key, member, now_ms)
            .zcard(key)
            .expire(key, ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e: deadpool_redis::redis::RedisError| MfaError::Internal(e.into()))?;

        Ok(count)
    }
}
