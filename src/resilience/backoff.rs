use rand::Rng;
use std::time::Duration;

/// BackoffPolicy decides how long to wait after attempt `attempt` (zero-based) before the next
/// attempt starts. `None` means go again immediately.
pub trait BackoffPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoBackoff;

impl BackoffPolicy for NoBackoff {
    fn next_delay(&self, _: u32) -> Option<Duration> {
        None
    }
}

#[derive(Copy, Clone, Debug)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        FixedBackoff { delay }
    }
}

impl BackoffPolicy for FixedBackoff {
    fn next_delay(&self, _: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// `base * 2^attempt`, capped at `max`, then scaled by a random factor in
/// `[1 - jitter, 1 + jitter]`.
#[derive(Copy, Clone, Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        ExponentialBackoff { base, max, jitter: 0.0 }
    }

    /// Jitter is clamped to `[0, 1]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.max(0.0).min(1.0);
        self
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let exponential_ms = base_ms.saturating_mul(1u64 << attempt.min(20));
        Duration::from_millis(exponential_ms.min(self.max.as_millis() as u64))
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let capped = self.capped_delay(attempt);
        if self.jitter == 0.0 {
            return Some(capped);
        }

        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Some(capped.mul_f64(factor))
    }
}
