//! Token bucket rate limiter for quote providers.
//!
//! Each provider gets its own bucket plus a minimum spacing between two
//! grants. The broker's budget is per account, so one limiter instance should
//! be shared by everything that talks to the same provider.
//!
//! Time is read from `tokio::time`, which makes the limiter deterministic
//! under a paused test runtime.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::models::ProviderId;
use crate::provider::RateLimit;

/// Bucket state for a single provider.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was refilled.
    last_update: Instant,
    /// Last time a token was granted.
    last_grant: Option<Instant>,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
    /// Minimum spacing between grants.
    min_delay: Duration,
}

impl TokenBucket {
    fn from_limit(limit: &RateLimit) -> Self {
        let capacity = f64::from(limit.burst_capacity.max(1));
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            last_grant: None,
            rate: f64::from(limit.requests_per_minute.max(1)) / 60.0,
            capacity,
            min_delay: limit.min_delay,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Time to wait before the next grant; zero if one is available now.
    fn wait_time(&mut self, now: Instant) -> Duration {
        self.refill(now);

        let spacing = self
            .last_grant
            .map(|last| (last + self.min_delay).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        let refill = if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        };

        spacing.max(refill)
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        if self.wait_time(now) > Duration::ZERO {
            return false;
        }
        self.tokens -= 1.0;
        self.last_grant = Some(now);
        true
    }
}

/// Per-provider rate limiter.
///
/// Buckets are created on first use from the provider's [`RateLimit`]; calling
/// [`configure`](Self::configure) replaces an existing bucket.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// A poisoned lock at worst yields slightly off pacing, which is better
    /// than panicking inside the acquisition loop.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Install (or reset) the bucket for a provider.
    pub fn configure(&self, provider: &ProviderId, limit: &RateLimit) {
        self.lock_buckets()
            .insert(provider.to_string(), TokenBucket::from_limit(limit));
    }

    /// Wait until the provider may be called again, then take a token.
    ///
    /// The future holds no lock while sleeping, so dropping it (for example
    /// when raced against a cancellation signal) is always safe.
    pub async fn acquire(&self, provider: &ProviderId, limit: &RateLimit) {
        loop {
            let wait_time = {
                let mut buckets = self.lock_buckets();
                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| TokenBucket::from_limit(limit));

                let now = Instant::now();
                if bucket.try_acquire(now) {
                    debug!("Rate limiter: acquired token for '{}'", provider);
                    return;
                }
                bucket.wait_time(now)
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, provider
            );
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Try to take a token without waiting.
    pub fn try_acquire(&self, provider: &ProviderId, limit: &RateLimit) -> bool {
        let mut buckets = self.lock_buckets();
        buckets
            .entry(provider.to_string())
            .or_insert_with(|| TokenBucket::from_limit(limit))
            .try_acquire(Instant::now())
    }

    /// Forget all state for a provider.
    pub fn reset(&self, provider: &ProviderId) {
        self.lock_buckets().remove(provider.as_ref());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
