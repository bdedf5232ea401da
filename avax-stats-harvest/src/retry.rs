//! Bounded retry with a fixed backoff schedule.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::error::FetchError;

/// How often and how patiently an external request is repeated.
///
/// The n-th retry waits `backoff_ms[n]`, clamped to the last entry.
/// `attempts = 1` disables retrying altogether.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first one.
    pub attempts: u32,
    /// Pause before each retry, in milliseconds.
    pub backoff_ms: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            backoff_ms: vec![0, 250, 1_000, 2_000],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn fail_fast() -> Self {
        Self {
            attempts: 1,
            backoff_ms: Vec::new(),
        }
    }

    /// Pause before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay(&self, retry: usize) -> Duration {
        let ms = self
            .backoff_ms
            .get(retry)
            .or_else(|| self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] seen.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.delay(attempt as usize - 1);
                    tracing::warn!(
                        request = what,
                        attempt,
                        ?delay,
                        error = %e,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
