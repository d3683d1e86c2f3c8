//! Bounded retry for operations that can lose an optimistic race.

use std::thread;
use std::time::Duration;

use vendstock_core::StockResult;

/// Linear-backoff retry bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 120,
        }
    }
}

impl RetryPolicy {
    /// Refill discipline: one immediate re-read after a lost race.
    pub const fn refill() -> Self {
        Self {
            max_attempts: 2,
            base_backoff_ms: 0,
        }
    }

    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }
}

/// Run `op` up to the policy bound, retrying only retryable errors.
///
/// Every attempt must re-read its own state; the combinator only schedules
/// attempts and sleeps `base_backoff x attempt` between them. Deterministic
/// failures (validation, insufficient stock) pass through on the first hit.
/// `name` identifies the operation in retry logs.
pub fn with_retries<T, F>(name: &str, policy: &RetryPolicy, mut op: F) -> StockResult<T>
where
    F: FnMut() -> StockResult<T>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                tracing::debug!("{name}: attempt {attempt} lost a race, retrying: {err}");
                let delay = policy.delay_for_attempt(attempt);
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use vendstock_core::StockError;

    use super::*;

    fn no_backoff(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff_ms: 0,
        }
    }

    #[test]
    fn succeeds_after_a_lost_race() {
        let mut calls = 0;
        let result = with_retries("test op", &no_backoff(2), || {
            calls += 1;
            if calls == 1 {
                Err(StockError::conflict("lost the race"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: StockResult<()> = with_retries("test op", &no_backoff(3), || {
            calls += 1;
            Err(StockError::conflict("still racing"))
        });
        assert_eq!(calls, 3);
        match result {
            Err(StockError::ConcurrentModification(_)) => {}
            other => panic!("Expected ConcurrentModification, got {other:?}"),
        }
    }

    #[test]
    fn deterministic_failures_are_not_retried() {
        let mut calls = 0;
        let result: StockResult<()> = with_retries("test op", &no_backoff(5), || {
            calls += 1;
            Err(StockError::insufficient(10, 3))
        });
        assert_eq!(calls, 1);
        match result {
            Err(StockError::InsufficientStock {
                requested: 10,
                available: 3,
            }) => {}
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 40,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(40));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(80));
    }
}
