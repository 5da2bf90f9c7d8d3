//! Retry policy implementation with exponential backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::OriginResult;

/// Exponential backoff around retryable origin failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Create retry policy from environment variables
    ///
    /// Reads `RANGECACHE_MAX_RETRIES`, `RANGECACHE_RETRY_BACKOFF` (ms),
    /// `RANGECACHE_MAX_BACKOFF` (s) and `RANGECACHE_BACKOFF_MULTIPLIER`;
    /// unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a policy from any key/value source, as [`RetryPolicy::from_env`]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: lookup("RANGECACHE_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            initial_backoff: lookup("RANGECACHE_RETRY_BACKOFF")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: lookup("RANGECACHE_MAX_BACKOFF")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.max_backoff, Duration::from_secs),
            multiplier: lookup("RANGECACHE_BACKOFF_MULTIPLIER")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.multiplier),
        }
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Blocks the calling thread between attempts.
    pub fn execute<T, F>(&self, mut f: F) -> OriginResult<T>
    where
        F: FnMut() -> OriginResult<T>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f() {
                Ok(result) => return Ok(result),
                Err(e) if !e.should_retry() || attempt >= self.max_attempts => {
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!("Attempt {} failed: {}", attempt, e);

                    std::thread::sleep(backoff);

                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.multiplier)
                            .min(self.max_backoff.as_secs_f64()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::OriginError;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
        assert!((policy.multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_policy_from_lookup() {
        let vars = std::collections::HashMap::from([
            ("RANGECACHE_MAX_RETRIES", "7"),
            ("RANGECACHE_RETRY_BACKOFF", "250"),
            ("RANGECACHE_BACKOFF_MULTIPLIER", "not a number"),
        ]);
        let policy = RetryPolicy::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert_eq!(policy.max_backoff, Duration::from_secs(10));
        assert!((policy.multiplier - 2.0).abs() < f64::EPSILON);

        assert_eq!(RetryPolicy::from_lookup(|_| None), RetryPolicy::default());
    }

    #[test]
    fn test_retries_transient_failures() {
        let calls = Cell::new(0);
        let result = fast_policy(3).execute(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(OriginError::unreachable("http://h/f", "connection reset"))
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.expect("third attempt succeeds"), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let calls = Cell::new(0);
        let result: OriginResult<()> = fast_policy(2).execute(|| {
            calls.set(calls.get() + 1);
            Err(OriginError::unreachable("http://h/f", "timeout"))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_does_not_retry_permanent_failures() {
        let calls = Cell::new(0);
        let result: OriginResult<()> = fast_policy(5).execute(|| {
            calls.set(calls.get() + 1);
            Err(OriginError::NotFound("http://h/f".to_string()))
        });

        assert!(matches!(result, Err(OriginError::NotFound(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_none_policy_tries_once() {
        let calls = Cell::new(0);
        let _ = RetryPolicy::none().execute(|| -> OriginResult<()> {
            calls.set(calls.get() + 1);
            Err(OriginError::unreachable("ftp://h/f", "refused"))
        });
        assert_eq!(calls.get(), 1);
    }
}
