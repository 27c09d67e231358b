//! Market data models
//!
//! This module contains the core data types exchanged with the broker:
//! - `types` - Type aliases for common identifiers (ProviderId, SymbolToken, Underlying)
//! - `exchange` - Exchange segments and the ordered per-exchange token map sent on the wire
//! - `instrument` - Raw catalog rows (InstrumentRecord) and their instrument types
//! - `quote` - Quote request modes and the snapshot/batch structures returned by providers

mod exchange;
mod instrument;
mod quote;
mod types;

pub use exchange::{ExchangeSegment, ExchangeTokens};
pub use instrument::{InstrumentRecord, InstrumentType};
pub use quote::{DepthLevel, MarketDepth, QuoteBatch, QuoteMode, QuoteSnapshot};
pub use types::{ProviderId, SymbolToken, Underlying};
