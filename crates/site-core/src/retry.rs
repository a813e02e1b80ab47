//! Bounded retry helper
//!
//! Every propagation wait in the provisioners goes through [`retry`]: a
//! predicate decides which errors are worth another attempt and a
//! [`RetryPolicy`] bounds how many attempts are made and how long to pause
//! between them.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;
use crate::error::Error;

/// Pause between two attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay every time
    Fixed(Duration),
    /// `base` after the first failure, doubling after each further one, never
    /// more than `cap`
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    /// Delay after `failures` failed attempts (1-based)
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, cap } => {
                let factor = 2u32
                    .checked_pow(failures.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                base.checked_mul(factor).map_or(cap, |delay| delay.min(cap))
            }
        }
    }
}

/// Attempt budget and backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Fixed delay between attempts
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Exponential backoff between attempts
    pub fn exponential(max_attempts: usize, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base, cap },
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent
///
/// # Parameters
///
/// - `policy`: Attempt budget and backoff
/// - `operation`: Name used in log lines
/// - `is_retryable`: Whether an error deserves another attempt
/// - `op`: The fallible operation
///
/// # Returns
///
/// The first success, or the last error once the budget is spent.
pub async fn retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = policy.backoff.delay(attempt as u32);
                debug!(
                    "{} attempt {}/{} failed: {}. Retrying in {:?}",
                    operation, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    warn!("{} failed after {} attempts: {}", operation, attempt, e);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, Service};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn not_found() -> Error {
        Error::api(Service::ObjectStorage, ErrorCode::NotFound, "missing")
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(30_000),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(5), Duration::from_millis(16_000));
        assert_eq!(backoff.delay(6), Duration::from_millis(30_000));
        assert_eq!(backoff.delay(40), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::fixed(5, Duration::ZERO);

        let counter = calls.clone();
        let result = retry(&policy, "probe", |e| e.is_code(&ErrorCode::NotFound), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(not_found())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_budget_and_on_fatal_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::fixed(3, Duration::ZERO);

        let counter = calls.clone();
        let result: Result<()> = retry(&policy, "probe", |_| true, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(not_found()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let counter = calls.clone();
        let result: Result<()> = retry(&policy, "probe", |_| false, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(not_found()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
