//! Sliding-window rate limiting per (subject, action).

use chrono::Duration;
use uuid::Uuid;

use crate::domain::repository::AttemptCounter;
use crate::domain::types::{RATE_LIMIT_MAX_ATTEMPTS, RATE_LIMIT_WINDOW_MINUTES};
use crate::error::MfaError;

/// Rate limiter over a durable shared [`AttemptCounter`]. Checking is
/// self-maintaining: every check records itself, limited or not, so
/// callers never issue a separate "record" step and a limited subject
/// stays limited until a full quiet window passes.
pub struct RateLimiter<C: AttemptCounter> {
    counter: C,
    max_attempts: u64,
    window: Duration,
}

impl<C: AttemptCounter> RateLimiter<C> {
    pub fn new(counter: C) -> Self {
        Self {
            counter,
            max_attempts: RATE_LIMIT_MAX_ATTEMPTS,
            window: Duration::minutes(RATE_LIMIT_WINDOW_MINUTES),
        }
    }

    pub fn with_limits(counter: C, max_attempts: u64, window: Duration) -> Self {
        Self {
            counter,
            max_attempts,
            window,
        }
    }

    /// Record an attempt for (subject, action) and report whether the
    /// trailing window already held `max_attempts` before this one.
    pub async fn is_rate_limited(&self, subject: Uuid, action: &str) -> Result<bool, MfaError> {
        let key = format!("mfa_rl:{subject}:{action}");
        let count = self.counter.record_and_count(&key, self.window).await?;
        Ok(count > self.max_attempts)
    }
}
