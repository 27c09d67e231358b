//! Provider trait definitions.
//!
//! Two seams separate the acquisition logic from the broker:
//! [`QuoteProvider`] prices tokens, [`CatalogSource`] lists instruments.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{ExchangeTokens, InstrumentRecord, QuoteBatch, QuoteMode};

use super::capabilities::RateLimit;

/// Default number of tokens a single quote request may carry.
pub const DEFAULT_MAX_TOKENS_PER_REQUEST: usize = 50;

/// Trait for live quote providers.
///
/// Callers must keep `tokens.total()` at or below
/// [`max_tokens_per_request`](Self::max_tokens_per_request). Implementations
/// reject larger requests with [`MarketDataError::RequestTooLarge`] before any
/// network call is made.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use marketfeed_market_data::provider::{QuoteProvider, RateLimit};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement connect / fetch_quotes
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider, used for logging and rate limiting.
    fn id(&self) -> &'static str;

    /// Pacing that should be applied when calling this provider.
    fn rate_limit(&self) -> RateLimit;

    /// Largest number of tokens accepted in one request.
    fn max_tokens_per_request(&self) -> usize {
        DEFAULT_MAX_TOKENS_PER_REQUEST
    }

    /// Establish or validate the session.
    ///
    /// `Ok(())` means the provider is ready to serve quotes.
    async fn connect(&self) -> Result<(), MarketDataError>;

    /// Whether the last `connect` succeeded and no request has since reported
    /// an invalid session.
    fn is_connected(&self) -> bool;

    /// Fetch quotes for the given tokens, grouped by exchange.
    async fn fetch_quotes(
        &self,
        mode: QuoteMode,
        tokens: &ExchangeTokens,
    ) -> Result<QuoteBatch, MarketDataError>;
}

/// Source of the broker's full instrument catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn id(&self) -> &'static str;

    /// Download and decode every row of the catalog.
    async fn fetch_catalog(&self) -> Result<Vec<InstrumentRecord>, MarketDataError>;
}
