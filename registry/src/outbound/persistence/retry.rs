//! Bounded re-execution of storage transactions after transient failures.
//!
//! Only whole transactions are re-run. A failed attempt has committed
//! nothing, so repeating it cannot duplicate a number, a record or an audit
//! entry.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::ports::RecordRepositoryError;

/// How often and how patiently a transient failure is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy making `max_attempts` attempts in total.
    ///
    /// Zero is treated as one: the operation always runs at least once.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Self::default()
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Cap the delay between attempts.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Total attempts, including the first.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (zero-based), doubling each time.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the attempts
    /// run out.
    ///
    /// # Errors
    ///
    /// Returns the last error once it is permanent or attempts are spent.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, RecordRepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RecordRepositoryError>>,
    {
        let mut retry = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_transient() && retry + 1 < self.max_attempts => {
                    let delay = self.backoff_for(retry);
                    warn!(
                        operation,
                        attempt = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient storage failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
