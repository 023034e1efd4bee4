//! Bounded retry with a fixed delay and an acceptance predicate.
//!
//! An attempt fails when it errors or when the predicate rejects its
//! output. Either way the next attempt starts after `delay`, until
//! `max_attempts` have been made. No delay follows the last attempt.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `attempt` until `accept` passes on its output.
    ///
    /// `attempt` receives the 1-based attempt number. Returns `None` when
    /// every attempt failed.
    pub async fn run<T, F, Fut>(&self, mut attempt: F, accept: impl Fn(&T) -> bool) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for n in 1..=self.max_attempts {
            info!(attempt = n, max_attempts = self.max_attempts, "attempt");
            match attempt(n).await {
                Ok(value) if accept(&value) => return Some(value),
                Ok(_) => warn!(attempt = n, "output rejected, retrying"),
                Err(e) => warn!(attempt = n, error = %e, "attempt failed, retrying"),
            }
            if n < self.max_attempts && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        None
    }
}
