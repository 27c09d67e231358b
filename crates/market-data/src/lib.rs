//! Marketfeed Market Data Crate
//!
//! Broker-facing building blocks for the quote collector.
//!
//! # Overview
//!
//! - Catalog and quote models shared by every layer
//! - The [`QuoteProvider`] and [`CatalogSource`] traits
//! - Angel One implementations: [`SmartApiProvider`] and [`ScripMasterClient`]
//! - Per-provider request pacing ([`RateLimiter`])
//!
//! # Core Types
//!
//! - [`InstrumentRecord`] - One row of the instrument catalog
//! - [`ExchangeTokens`] - Tokens grouped by exchange, in request order
//! - [`QuoteSnapshot`] - Live quote for one instrument
//! - [`QuoteBatch`] - Fetched and unfetched results of one request

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{MarketDataError, RetryClass};

pub use models::{
    DepthLevel, ExchangeSegment, ExchangeTokens, InstrumentRecord, InstrumentType, MarketDepth,
    ProviderId, QuoteBatch, QuoteMode, QuoteSnapshot, SymbolToken, Underlying,
};

pub use provider::scrip_master::{ScripMasterClient, DEFAULT_CATALOG_URL};
pub use provider::smartapi::{SmartApiCredentials, SmartApiOptions, SmartApiProvider};
pub use provider::{CatalogSource, QuoteProvider, RateLimit, DEFAULT_MAX_TOKENS_PER_REQUEST};

pub use registry::RateLimiter;
