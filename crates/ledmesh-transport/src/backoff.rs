use std::time::Duration;

use rand::Rng;

/// Reconnect delay policy: exponential growth from `base` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound for the un-jittered delay.
    pub max: Duration,
    /// Fraction of the delay that may be added as random jitter (0.0 disables).
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

/// Stateful backoff tracker for one retry loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            policy,
        }
    }

    /// Delay to wait before the next attempt. Advances the internal state.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.checked_mul(2).unwrap_or(self.policy.max);
        self.current = next.min(self.policy.max);
        delay + self.jitter_for(delay)
    }

    fn jitter_for(&self, delay: Duration) -> Duration {
        let fraction = self.policy.jitter.clamp(0.0, 1.0);
        if fraction == 0.0 || delay.is_zero() {
            return Duration::ZERO;
        }
        let bound = delay.mul_f64(fraction);
        let nanos = rand::thread_rng().gen_range(0..=bound.as_nanos() as u64);
        Duration::from_nanos(nanos)
    }
}
