//! Bounded exponential backoff around provider calls.

use marketlens::config::SyncConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt count and the first backoff delay. Delay `n` (0-based) is
/// `base_delay * 2^n`, so the defaults wait 1s, 2s, 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: config.retry_base_delay(),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Runs `op` until it succeeds or `policy.max_attempts` is reached.
///
/// Every error is retried; the last one is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= max_attempts => {
                warn!(
                    operation = %label,
                    attempts = max_attempts,
                    error = %e,
                    "Giving up after final attempt"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = %label,
                    attempt = attempt + 1,
                    max_attempts = max_attempts,
                    error = %e,
                    "Attempt failed, will retry"
                );
                debug!(
                    operation = %label,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
