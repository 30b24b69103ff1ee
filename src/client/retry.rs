//! Explicit retry and reconnect policies for network calls
//!
//! State-changing calls get a bounded number of attempts; idempotent reads may
//! retry indefinitely with a fixed delay. Stream reconnection uses a doubling
//! backoff with a hard cap, reset once traffic flows again.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Retry policy applied around a single network call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts; `None` retries until success
    pub max_attempts: Option<u32>,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: Option<u32>, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Policy for calls that mutate server state
    pub const fn state_changing() -> Self {
        Self::new(Some(3), Duration::from_secs(5))
    }

    /// Policy for idempotent reads
    pub const fn idempotent_read() -> Self {
        Self::new(None, Duration::from_secs(5))
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if let Some(max) = self.max_attempts {
                        if attempt >= max {
                            return Err(e);
                        }
                    }
                    debug!(
                        "Attempt {} failed: {}. Retrying in {:?}",
                        attempt, e, self.delay
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}

/// Doubling backoff for stream reconnects
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// The delay to wait before the next reconnect attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Reset after a successful reconnect
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
