//! Fixed-delay bounded retry for startup connections.
//!
//! Steady-state job processing never retries; only connection bootstrap
//! goes through [`retry_fixed`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

/// Run `op` until it succeeds or `policy.max_attempts` is exhausted.
///
/// Returns the last error when every attempt fails.
pub async fn retry_fixed<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "{what} succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "{what} failed, retrying",
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                tracing::error!(attempts = attempt, error = %e, "{what} failed, giving up");
                return Err(e);
            }
        }
    }
}
