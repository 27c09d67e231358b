//! Provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` and `CatalogSource` traits
//! - Rate limiting configuration
//! - The Angel One SmartAPI quote provider and scrip master catalog client

mod capabilities;
mod traits;

pub mod scrip_master;
pub mod smartapi;

// Re-exports
pub use capabilities::RateLimit;
pub use traits::{CatalogSource, QuoteProvider, DEFAULT_MAX_TOKENS_PER_REQUEST};
