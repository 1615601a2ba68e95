use rand::Rng;
use std::time::Duration;

/// Retry schedule for idempotent reads. Mutations are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. `1` disables retrying.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Wait before attempt `attempt + 1`: `base_delay * 2^(attempt - 1)`
    /// plus up to half a `base_delay` of jitter.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exp);
        let jitter_cap = (self.base_delay.as_millis() / 2) as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_cap)
        };
        backoff.saturating_add(Duration::from_millis(jitter))
    }
}
