//! Rate limiting configuration for providers.

use std::time::Duration;

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider. The broker applies one
/// budget per account, so requests are always issued sequentially and these
/// values describe the pacing between them.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Requests that may be issued back to back before the per-minute rate applies.
    pub burst_capacity: u32,

    /// Minimum delay between two consecutive requests.
    pub min_delay: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_capacity: 1,
            min_delay: Duration::from_secs(1),
        }
    }
}
