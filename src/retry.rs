//! Retry policy shared by the blocking and async clients.
//!
//! Both clients ask [`RetryPolicy::decide`] what to do after a failed attempt,
//! so they perform the same number of attempts with the same waits for the
//! same sequence of responses.

use crate::config::DEFAULT_MAX_RETRIES;
use crate::Error;
use rand::Rng;
use std::time::Duration;

/// Decides when and how long to wait before retrying a failed request.
///
/// Rate limit responses with a `Retry-After` header wait exactly as long as
/// the server asked. Every other retryable failure backs off exponentially:
/// `base_delay * 2^attempt`, i.e. 1s, 2s, 4s, 8s... with the default base.
///
/// # Examples
///
/// ```
/// use mailbreeze::{classify, RetryPolicy};
///
/// let policy = RetryPolicy::default();
/// let server_error = classify(503, "unavailable", None, None, None);
///
/// assert!(policy.should_retry(&server_error, 0));
/// assert_eq!(policy.delay_millis(&server_error, 0), 1000);
/// assert_eq!(policy.delay_millis(&server_error, 2), 4000);
/// assert!(!policy.should_retry(&server_error, 3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub base_delay: Duration,
    /// Scale exponential delays by a random factor in `[0.5, 1.0]`.
    ///
    /// Server-specified `Retry-After` delays are never jittered.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            jitter: false,
        }
    }
}

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Surface the error to the caller.
    GiveUp,
}

impl RetryPolicy {
    /// Returns `true` if `error` is retryable and `attempt` (0-based) is
    /// still within the budget.
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }

    /// Delay in milliseconds before the attempt following `attempt`.
    ///
    /// Does not apply jitter; see [`RetryPolicy::delay_for`].
    pub fn delay_millis(&self, error: &Error, attempt: u32) -> u64 {
        if let Some(seconds) = error.retry_after() {
            return seconds.saturating_mul(1000);
        }
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        base.saturating_mul(2u64.saturating_pow(attempt))
    }

    /// Delay before the attempt following `attempt`, with jitter applied to
    /// exponential backoff when enabled.
    pub fn delay_for(&self, error: &Error, attempt: u32) -> Duration {
        let delay = Duration::from_millis(self.delay_millis(error, attempt));
        if self.jitter && error.retry_after().is_none() {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(jitter_factor)
        } else {
            delay
        }
    }

    /// Decides what to do after `attempt` failed with `error`.
    pub fn decide(&self, error: &Error, attempt: &Attempt) -> RetryDecision {
        if self.should_retry(error, attempt.index()) {
            RetryDecision::Retry(self.delay_for(error, attempt.index()))
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// State of one logical call's attempt loop.
///
/// Immutable: moving to the next attempt produces a new value that carries
/// the error which triggered the retry.
#[derive(Debug, Clone, Default)]
pub struct Attempt {
    index: u32,
    last_error: Option<Error>,
}

impl Attempt {
    /// The first attempt of a call.
    pub fn first() -> Self {
        Self::default()
    }

    /// The attempt that follows this one after it failed with `error`.
    pub fn retry(self, error: Error) -> Self {
        Self {
            index: self.index + 1,
            last_error: Some(error),
        }
    }

    /// 0-based attempt index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Number of HTTP attempts made once this one completes.
    pub fn number(&self) -> u32 {
        self.index + 1
    }

    /// The error that caused this attempt to be made, if it is a retry.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;

    fn server_error() -> Error {
        classify(500, "boom", None, None, None)
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let policy = RetryPolicy {
            max_retries: 10,
            ..RetryPolicy::default()
        };

        for attempt in 0..=10 {
            assert_eq!(
                policy.delay_millis(&server_error(), attempt),
                1000 * 2u64.pow(attempt)
            );
        }
    }

    #[test]
    fn test_retry_after_takes_precedence() {
        let policy = RetryPolicy::default();
        let limited = classify(429, "slow down", None, Some(60), None);

        for attempt in 0..5 {
            assert_eq!(policy.delay_millis(&limited, attempt), 60_000);
        }
    }

    #[test]
    fn test_rate_limit_without_header_backs_off() {
        let policy = RetryPolicy::default();
        let limited = classify(429, "slow down", None, None, None);
        assert_eq!(policy.delay_millis(&limited, 1), 2000);
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };

        assert!(policy.should_retry(&server_error(), 0));
        assert!(policy.should_retry(&server_error(), 1));
        assert!(!policy.should_retry(&server_error(), 2));
    }

    #[test]
    fn test_non_retryable_never_retried() {
        let policy = RetryPolicy::default();
        for status in [400, 401, 404, 418] {
            let err = classify(status, "no", None, None, None);
            assert!(!policy.should_retry(&err, 0), "status {status}");
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_millis(&server_error(), 200), u64::MAX);
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };

        for _ in 0..50 {
            let delay = policy.delay_for(&server_error(), 1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(2000));
        }

        let limited = classify(429, "slow down", None, Some(3), None);
        assert_eq!(policy.delay_for(&limited, 1), Duration::from_secs(3));
    }

    #[test]
    fn test_decide_walks_the_budget() {
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };

        let attempt = Attempt::first();
        assert_eq!(attempt.number(), 1);
        assert_eq!(
            policy.decide(&server_error(), &attempt),
            RetryDecision::Retry(Duration::from_secs(1))
        );

        let attempt = attempt.retry(server_error());
        assert_eq!(attempt.index(), 1);
        assert!(attempt.last_error().is_some());
        assert_eq!(policy.decide(&server_error(), &attempt), RetryDecision::GiveUp);
    }
}
