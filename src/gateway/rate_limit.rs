//! Rate limiting for tool invocations.
//!
//! Token bucket pacing for outgoing gateway calls, so a busy worker does
//! not hammer the remote scanning service or the target.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Paces tool invocations to a maximum per-second rate.
pub struct InvocationLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl InvocationLimiter {
    /// Create a limiter allowing `rate` invocations per second.
    ///
    /// A zero rate is coerced to one per second rather than panicking.
    pub fn new(rate: u32) -> Self {
        let rate = NonZeroU32::new(rate).unwrap_or(nonzero!(1u32));
        let limiter = RateLimiter::direct(Quota::per_second(rate));

        Self {
            limiter: Arc::new(limiter),
        }
    }

    /// Wait until the rate limit allows another invocation.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Clone for InvocationLimiter {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_allows_first_invocation() {
        let limiter = InvocationLimiter::new(50);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_limiter_wait_completes() {
        let limiter = InvocationLimiter::new(1000);
        tokio_test::block_on(limiter.wait());
    }

    #[test]
    fn test_zero_rate_coerced() {
        // Must not panic
        let _ = InvocationLimiter::new(0);
    }
}
