//! Retry of operations interrupted by transient sandbox resets.
//!
//! # Design
//! - Classification comes from the error's tagged kind, never from its message.
//! - Non-transient failures return on the first attempt; exhausted retries return the
//!   last transient error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use berth_config::RetryConfig;
use berth_sandbox::SandboxError;
use tracing::{debug, warn};

/// Errors that can report whether a retry may succeed.
pub trait TransientClassify {
    /// Whether the failure was a transient execution-environment reset.
    fn is_transient(&self) -> bool;
}

impl TransientClassify for SandboxError {
    fn is_transient(&self) -> bool {
        Self::is_transient(self)
    }
}

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first; zero behaves like one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.delay,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails non-transiently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient error once every
    /// attempt is spent.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientClassify + Display,
    {
        self.run_with_hook(operation, op, |_| {}).await
    }

    /// Like [`RetryPolicy::run`], invoking `on_retry` with the failed attempt number
    /// before each retry.
    ///
    /// # Errors
    ///
    /// Same as [`RetryPolicy::run`].
    pub async fn run_with_hook<T, E, F, Fut, H>(
        &self,
        operation: &'static str,
        mut op: F,
        on_retry: H,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientClassify + Display,
        H: Fn(u32),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "operation recovered after transient reset");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay = ?self.delay,
                        error = %err,
                        "transient sandbox reset; retrying"
                    );
                    on_retry(attempt);
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(operation, attempts = attempt, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn reset() -> SandboxError {
        SandboxError::TransientReset {
            operation: "read_file",
            detail: "container restarted".into(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(3),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_attempt_k_after_transient_failures() {
        let calls = Cell::new(0_u32);
        let retries = Cell::new(0_u32);
        let started = tokio::time::Instant::now();

        let result = policy()
            .run_with_hook(
                "read_file",
                || {
                    calls.set(calls.get() + 1);
                    let attempt = calls.get();
                    async move { if attempt < 3 { Err(reset()) } else { Ok(attempt) } }
                },
                |_| retries.set(retries.get() + 1),
            )
            .await;

        assert_eq!(result.ok(), Some(3));
        assert_eq!(calls.get(), 3);
        assert_eq!(retries.get(), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failures_are_not_retried() {
        let calls = Cell::new(0_u32);
        let result: Result<(), SandboxError> = policy()
            .run("read_file", || {
                calls.set(calls.get() + 1);
                async {
                    Err(SandboxError::NotFound {
                        operation: "read_file",
                        path: "/data/config/x.json".into(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(SandboxError::NotFound { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_transient_error() {
        let calls = Cell::new(0_u32);
        let started = tokio::time::Instant::now();
        let result: Result<(), SandboxError> = policy()
            .run("list_files", || {
                calls.set(calls.get() + 1);
                async { Err(reset()) }
            })
            .await;
        assert!(result.is_err_and(|err| err.is_transient()));
        assert_eq!(calls.get(), 5);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(12) && waited < Duration::from_secs(13));
    }
}
