//! Persisted quote model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketfeed_market_data::QuoteSnapshot;

/// A snapshot as stored, keyed by `(snapshot.symbol_token, ingested_at)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredQuote {
    pub ingested_at: DateTime<Utc>,
    pub snapshot: QuoteSnapshot,
}
