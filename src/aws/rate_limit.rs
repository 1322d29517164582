//! Client-side rate limiting for provider calls.
//!
//! Every attempt, including retries, takes one permit before calling the
//! provider.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default permits per second.
pub const DEFAULT_RATE_PER_SECOND: u32 = 10;

/// Hands out permits for provider calls.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Waits until a permit is available.
    async fn acquire(&self);
}

/// Evenly spaced permits with a burst of one.
///
/// Waiters reserve their slot under the lock and sleep outside it, so permits
/// are granted in arrival order.
#[derive(Debug)]
pub struct TokenBucket {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl TokenBucket {
    /// Creates a limiter granting `rate` permits per second.
    ///
    /// A rate of zero disables limiting.
    #[must_use]
    pub fn per_second(rate: u32) -> Self {
        let interval = if rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / rate
        };

        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Spacing between two permits.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::per_second(DEFAULT_RATE_PER_SECOND)
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Grants every permit immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn acquire(&self) {}
}
