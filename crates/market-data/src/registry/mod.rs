//! Request pacing shared by everything that calls a provider.

mod rate_limiter;

pub use rate_limiter::RateLimiter;
