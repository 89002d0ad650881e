//! What the driver does when a probe fails with a retriable error.

use crate::config::RetryConfig;
use crate::sessions::ExecuteError;
use std::time::Duration;

/// Decision returned by a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep this long, then probe again.
    RetryAfter(Duration),
    /// Give up and stop the driver.
    Abort,
}

/// Policy injection point for retriable failures.
pub trait RetryPolicy: Send {
    /// `consecutive` counts retriable failures since the last success, starting at 1.
    fn on_retriable(&mut self, consecutive: u32, err: &ExecuteError) -> RetryDecision;

    /// Called after every successful probe.
    fn reset(&mut self) {}
}

/// Exponential backoff with a cap on consecutive attempts.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    factor: f64,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, factor: f64, max_attempts: u32) -> Self {
        Self {
            initial,
            max,
            factor: factor.max(1.0),
            max_attempts,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_ms),
            Duration::from_millis(config.max_ms),
            config.factor,
            config.max_attempts,
        )
    }

    /// Delay before attempt `consecutive + 1`.
    pub fn delay(&self, consecutive: u32) -> Duration {
        let exponent = consecutive.saturating_sub(1).min(32) as i32;
        let millis = self.initial.as_millis() as f64 * self.factor.powi(exponent);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy for BackoffPolicy {
    fn on_retriable(&mut self, consecutive: u32, _err: &ExecuteError) -> RetryDecision {
        if consecutive > self.max_attempts {
            RetryDecision::Abort
        } else {
            RetryDecision::RetryAfter(self.delay(consecutive))
        }
    }
}

/// Stop at the first retriable failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFast;

impl RetryPolicy for FailFast {
    fn on_retriable(&mut self, _consecutive: u32, _err: &ExecuteError) -> RetryDecision {
        RetryDecision::Abort
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::ErrorKind;

    fn unreachable() -> ExecuteError {
        ExecuteError::RetriableResource {
            kind: ErrorKind::ResourceUnreachable,
            message: "connection refused".into(),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = BackoffPolicy::new(
            Duration::from_millis(1000),
            Duration::from_millis(5000),
            2.0,
            10,
        );
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(4), Duration::from_millis(5000));
        assert_eq!(policy.delay(40), Duration::from_millis(5000));
    }

    #[test]
    fn backoff_aborts_after_max_attempts() {
        let mut policy = BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(10), 2.0, 2);
        let err = unreachable();
        assert!(matches!(policy.on_retriable(1, &err), RetryDecision::RetryAfter(_)));
        assert!(matches!(policy.on_retriable(2, &err), RetryDecision::RetryAfter(_)));
        assert_eq!(policy.on_retriable(3, &err), RetryDecision::Abort);
    }

    #[test]
    fn factor_below_one_does_not_shrink() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(1), 0.5, 3);
        assert_eq!(policy.delay(3), Duration::from_millis(100));
    }

    #[test]
    fn fail_fast_always_aborts() {
        assert_eq!(FailFast.on_retriable(1, &unreachable()), RetryDecision::Abort);
    }
}
