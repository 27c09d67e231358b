//! Token storage traits.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::model::{ResolvedToken, TokenType};
use crate::errors::Result;

/// Storage interface for the resolved universe.
///
/// The universe is only ever replaced wholesale: readers see either the
/// previous set or the new one, never a mix of both.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Atomically replaces every stored token with `tokens`.
    ///
    /// Order is preserved for later reads. Returns the number of rows written.
    async fn replace_all(
        &self,
        tokens: Vec<ResolvedToken>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// Tokens of one type in resolution order, optionally truncated.
    fn tokens_by_type(
        &self,
        token_type: TokenType,
        limit: Option<usize>,
    ) -> Result<Vec<ResolvedToken>>;

    /// Number of stored tokens.
    fn count(&self) -> Result<usize>;

    /// When the stored universe was written, if ever.
    fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// Earliest expiry among stored futures.
    fn earliest_futures_expiry(&self) -> Result<Option<NaiveDate>>;
}
