//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for catalog and quote operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while talking to the broker.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which the acquisition loop uses to decide what happens next.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// No authenticated session, or the broker rejected the credentials.
    #[error("Session unavailable: {provider} - {message}")]
    SessionUnavailable {
        /// The provider that rejected the session
        provider: String,
        /// Reason reported by the provider
        message: String,
    },

    /// The provider rate limited the request (HTTP 429 or an equivalent body).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with a failure status.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// A quote request carried more tokens than the provider accepts.
    /// Raised before any I/O happens.
    #[error("Request too large: {requested} tokens, limit is {limit}")]
    RequestTooLarge {
        /// Tokens in the rejected request
        requested: usize,
        /// Provider's per-request limit
        limit: usize,
    },

    /// The provider's payload could not be decoded.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that sent the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The instrument catalog could not be downloaded or decoded.
    #[error("Instrument catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketfeed_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "SMARTAPI".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::NextCycle);
    ///
    /// let error = MarketDataError::RequestTooLarge { requested: 51, limit: 50 };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // The request is malformed; sending it again cannot succeed
            Self::RequestTooLarge { .. } | Self::InvalidResponse { .. } => RetryClass::Never,

            Self::SessionUnavailable { .. } => RetryClass::Reconnect,

            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::CatalogUnavailable(_)
            | Self::Network(_) => RetryClass::NextCycle,
        }
    }

    /// Whether this error was raised by the provider's throttling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
