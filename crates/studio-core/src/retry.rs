use std::time::Duration;

/// Backoff schedule for idempotent requests.
///
/// The n-th retry waits `initial_backoff * multiplier^n`, capped at
/// `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first request.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    /// Two retries, waiting 1s then 2s.
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Doubling backoff starting at `initial_backoff`, capped at 30s.
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }

    /// Values below 1.0 are clamped to 1.0 (constant backoff).
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn can_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Wait before retry number `retries_done + 1`.
    pub fn delay_for(&self, retries_done: u32) -> Duration {
        let exponent = retries_done.min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let scaled = (self.initial_backoff.as_nanos() as f64 * factor).round();
        if !scaled.is_finite() || scaled >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(scaled as u64)
    }

    /// Every wait the policy allows, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|n| self.delay_for(n))
    }
}
