use std::time::Duration;

use rand::Rng;

use concord_common::BackoffConfig;

/// Exponential reconnect backoff with jitter
///
/// Attempt `n` waits `base * 2^min(n - 1, 6)` scaled by a random factor in
/// `[0.75, 1.25]`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_ms),
            Duration::from_millis(config.max_ms),
        )
    }

    /// Delay before attempt `attempt` (1-based), without jitter
    pub fn nominal(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(6);
        self.base.saturating_mul(1 << exponent).min(self.max)
    }

    /// Delay before attempt `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(0.75..=1.25);
        self.nominal(attempt).mul_f64(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_doubles_then_caps() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(backoff.nominal(1), Duration::from_secs(1));
        assert_eq!(backoff.nominal(2), Duration::from_secs(2));
        assert_eq!(backoff.nominal(4), Duration::from_secs(8));
        assert_eq!(backoff.nominal(7), Duration::from_secs(60));
        assert_eq!(backoff.nominal(50), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_stays_within_jitter_band() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        for _ in 0..100 {
            let delay = backoff.delay(3);
            assert!(delay >= Duration::from_secs(3), "{delay:?}");
            assert!(delay <= Duration::from_secs(5), "{delay:?}");
        }
        assert!(backoff.delay(10) <= Duration::from_secs(60));
    }
}
