//! Minimum spacing between calls to one backend.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tracing::debug;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Paces calls so that consecutive admissions are at least `min_interval`
/// apart.
///
/// Owned by one backend client instance; never shared through globals.
/// A zero interval disables pacing.
pub struct RateLimiter {
    inner: Option<DirectLimiter>,
    min_interval: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .field("enabled", &self.inner.is_some())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        let inner = Quota::with_period(min_interval)
            .map(|quota| governor::RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));
        Self {
            inner,
            min_interval,
        }
    }

    /// Limiter that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next call may proceed and record it.
    pub async fn wait(&self) {
        let Some(limiter) = &self.inner else {
            return;
        };
        if limiter.check().is_ok() {
            return;
        }
        debug!(
            min_interval_ms = self.min_interval.as_millis() as u64,
            "Rate limiting: waiting for next slot"
        );
        limiter.until_ready().await;
    }
}
