//! Timeout and backoff policy for external calls.

use crate::domain::AnalysisConfig;
use crate::error::ResolverError;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            attempt_timeout: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_retries: config.external_max_retries,
            attempt_timeout: config.external_timeout(),
            ..Self::default()
        }
    }

    /// Total attempts, the first call included.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (1-based), capped then jittered.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponential = base_ms * self.exponential_base.powi(attempt.saturating_sub(1) as i32);
        let mut delay = Duration::from_millis(exponential.min(u64::MAX as f64) as u64);
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        if self.jitter {
            let jitter_factor = rand::rng().random_range(0.5..1.5);
            delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }
        delay
    }

    /// Backoff for a failed attempt, stretched to honour a server `Retry-After`.
    pub fn delay_after(&self, attempt: u32, error: &ResolverError) -> Duration {
        let backoff = self.backoff_delay(attempt);
        match error {
            ResolverError::RateLimited { retry_after: Some(wait) } => backoff.max(*wait),
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy { jitter: false, ..RetryPolicy::default() }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = no_jitter();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(16));
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_a_half() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.backoff_delay(2);
            assert!(delay >= Duration::from_millis(1000) && delay < Duration::from_millis(3000));
        }
    }

    #[test]
    fn retry_after_extends_backoff() {
        let policy = no_jitter();
        let err = ResolverError::RateLimited { retry_after: Some(Duration::from_secs(9)) };
        assert_eq!(policy.delay_after(1, &err), Duration::from_secs(9));
        let err = ResolverError::Transport("reset".into());
        assert_eq!(policy.delay_after(1, &err), Duration::from_secs(1));
    }

    #[test]
    fn attempts_count_first_call() {
        let cfg = AnalysisConfig { external_max_retries: 3, ..Default::default() };
        let policy = RetryPolicy::from_config(&cfg);
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(30));
    }
}
