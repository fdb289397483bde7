//! Retry policy with capped exponential backoff and random jitter.
//!
//! Rate-limited LLM APIs fail in bursts. Each failed attempt waits
//! `min(max_delay, previous × multiplier)` (starting from `base_delay`) plus a
//! uniform jitter in `[0, jitter)`. With the defaults the waits are roughly
//! 3 s, 4.5 s, 6.75 s, 10.1 s (+ up to 2 s each) across 5 attempts. No wait
//! follows the final attempt.
//!
//! The policy is independent of what is being retried: [`RetryPolicy::run`]
//! takes any async operation and reports every attempt's error.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 5.
    pub max_attempts: u32,
    /// Delay the first multiplication starts from. Default: 2 s.
    pub base_delay: Duration,
    /// Growth factor per failure. Default: 1.5.
    pub multiplier: f64,
    /// Upper bound on the deterministic part of the delay. Default: 60 s.
    pub max_delay: Duration,
    /// Exclusive upper bound of the uniform jitter. Default: 2 s.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            multiplier: 1.5,
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_secs(2),
        }
    }
}

/// Result of [`RetryPolicy::run`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// `Some` when an attempt succeeded.
    pub value: Option<T>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Errors of the failed attempts, in order.
    pub errors: Vec<E>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn succeeded(&self) -> bool {
        self.value.is_some()
    }
}

impl RetryPolicy {
    /// A policy that never sleeps. Useful for tests and for backends that do
    /// their own rate limiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Deterministic part of the wait after the `failures`-th failure (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let mut secs = self.base_delay.as_secs_f64();
        let cap = self.max_delay.as_secs_f64();
        for _ in 0..failures {
            secs = (secs * self.multiplier).min(cap);
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Full wait after the `failures`-th failure: backoff plus jitter.
    pub fn delay<R: Rng + ?Sized>(&self, failures: u32, rng: &mut R) -> Duration {
        let base = self.backoff(failures);
        if self.jitter.is_zero() {
            return base;
        }
        base + Duration::from_secs_f64(rng.gen_range(0.0..self.jitter.as_secs_f64()))
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. `rng` supplies jitter.
    pub async fn run<T, E, F, Fut, R>(&self, rng: &mut R, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Rng + ?Sized,
    {
        let attempts_allowed = self.max_attempts.max(1);
        let mut errors = Vec::new();

        for attempt in 1..=attempts_allowed {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        value: Some(value),
                        attempts: attempt,
                        errors,
                    }
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed — {}", attempt, attempts_allowed, e);
                    errors.push(e);
                    if attempt < attempts_allowed {
                        let wait = self.delay(attempt, rng);
                        if !wait.is_zero() {
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            }
        }

        RetryOutcome {
            value: None,
            attempts: attempts_allowed,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_backoff_sequence() {
        let p = RetryPolicy::default();
        let secs: Vec<f64> = (1..=4).map(|n| p.backoff(n).as_secs_f64()).collect();
        let expected = [3.0, 4.5, 6.75, 10.125];
        for (got, want) in secs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn backoff_is_capped() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(50), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_in_range() {
        let p = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=5 {
            let d = p.delay(n, &mut rng);
            let base = p.backoff(n);
            assert!(d >= base && d < base + Duration::from_secs(2));
        }
    }

    #[test]
    fn succeeds_after_failures() {
        let p = RetryPolicy::immediate(5);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = tokio_test::block_on(p.run(&mut rng, |attempt| async move {
            if attempt < 3 {
                Err(format!("boom {attempt}"))
            } else {
                Ok(attempt * 10)
            }
        }));
        assert_eq!(outcome.value, Some(30));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.errors, vec!["boom 1".to_string(), "boom 2".to_string()]);
    }

    #[test]
    fn exhausts_budget() {
        let p = RetryPolicy::immediate(5);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome: RetryOutcome<(), String> =
            tokio_test::block_on(p.run(&mut rng, |_| async { Err("nope".to_string()) }));
        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.errors.len(), 5);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let p = RetryPolicy::immediate(0);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome: RetryOutcome<u8, String> =
            tokio_test::block_on(p.run(&mut rng, |_| async { Ok(1) }));
        assert_eq!(outcome.attempts, 1);
    }
}
