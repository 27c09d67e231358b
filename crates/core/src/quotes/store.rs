//! Quote storage traits.
//!
//! This module defines the storage interface for collected quotes. The
//! acquisition engine only writes; readers downstream use the query methods.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::StoredQuote;
use crate::errors::Result;
use marketfeed_market_data::QuoteSnapshot;

/// Storage interface for quote snapshots.
///
/// # Method Naming Convention
///
/// - `upsert_*` - Insert or overwrite by key
/// - `latest` / `history` - Read back by token, newest first
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Writes snapshots under one ingest timestamp.
    ///
    /// Rows are keyed by `(symbol_token, ingested_at)`. Writing the same key
    /// again overwrites the value columns and never adds a row. Returns the
    /// number of snapshots written.
    async fn upsert_snapshots(
        &self,
        ingested_at: DateTime<Utc>,
        snapshots: &[QuoteSnapshot],
    ) -> Result<usize>;

    /// Most recent stored quote for a token.
    fn latest(&self, symbol_token: &str) -> Result<Option<StoredQuote>>;

    /// Up to `limit` stored quotes for a token, newest first.
    fn history(&self, symbol_token: &str, limit: usize) -> Result<Vec<StoredQuote>>;

    /// Total number of stored rows.
    fn count(&self) -> Result<usize>;
}
