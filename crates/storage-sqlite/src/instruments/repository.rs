use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::dsl::min;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};

use super::model::{parse_date, TokenDB, TokenRefreshDB, TOKEN_COLUMNS};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::token_refreshes::dsl as refreshes_dsl;
use crate::schema::tokens::dsl as tokens_dsl;
use crate::utils::chunk_for_insert;
use marketfeed_core::instruments::{ResolvedToken, TokenStore, TokenType};
use marketfeed_core::Result;

/// Id of the only row in `token_refreshes`.
const REFRESH_ROW_ID: i32 = 1;

pub struct TokenRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl TokenRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StorageError::SerializationError(format!("'{}' is not a timestamp: {}", value, e))
        })
}

#[async_trait]
impl TokenStore for TokenRepository {
    async fn replace_all(
        &self,
        tokens: Vec<ResolvedToken>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut seen = HashSet::with_capacity(tokens.len());
        let mut rows: Vec<TokenDB> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if !seen.insert(token.token.as_str()) {
                warn!(
                    "Skipping repeated token {} ({}), keeping the first",
                    token.token, token.symbol
                );
                continue;
            }
            let position = i32::try_from(rows.len()).map_err(|_| {
                StorageError::SerializationError(format!(
                    "Universe of {} tokens exceeds the position range",
                    tokens.len()
                ))
            })?;
            rows.push(TokenDB::from_domain(position, token));
        }
        let marker = TokenRefreshDB {
            id: REFRESH_ROW_ID,
            refreshed_at: refreshed_at.to_rfc3339(),
            token_count: i64::try_from(rows.len()).unwrap_or(i64::MAX),
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let removed = diesel::delete(tokens_dsl::tokens)
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;

                let mut written = 0;
                for chunk in chunk_for_insert(&rows, TOKEN_COLUMNS) {
                    written += diesel::insert_into(tokens_dsl::tokens)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                }

                diesel::replace_into(refreshes_dsl::token_refreshes)
                    .values(&marker)
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;

                debug!("Replaced {} stored tokens with {}", removed, written);
                Ok(written)
            })
            .await
    }

    fn tokens_by_type(
        &self,
        token_type: TokenType,
        limit: Option<usize>,
    ) -> Result<Vec<ResolvedToken>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = tokens_dsl::tokens
            .filter(tokens_dsl::token_type.eq(token_type.as_str()))
            .order(tokens_dsl::position.asc())
            .select(TokenDB::as_select())
            .into_boxed();

        if let Some(limit) = limit {
            query = query.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query.load::<TokenDB>(&mut conn).into_core()?;

        rows.into_iter()
            .map(|row| ResolvedToken::try_from(row).map_err(marketfeed_core::Error::from))
            .collect()
    }

    fn count(&self) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = tokens_dsl::tokens
            .count()
            .get_result(&mut conn)
            .into_core()?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let mut conn = get_connection(&self.pool)?;
        let stored = refreshes_dsl::token_refreshes
            .filter(refreshes_dsl::id.eq(REFRESH_ROW_ID))
            .select(refreshes_dsl::refreshed_at)
            .first::<String>(&mut conn)
            .optional()
            .into_core()?;

        stored
            .map(|value| parse_timestamp(&value).map_err(marketfeed_core::Error::from))
            .transpose()
    }

    fn earliest_futures_expiry(&self) -> Result<Option<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;
        // ISO dates order correctly as text
        let earliest = tokens_dsl::tokens
            .filter(tokens_dsl::token_type.eq(TokenType::Futures.as_str()))
            .select(min(tokens_dsl::expiry))
            .first::<Option<String>>(&mut conn)
            .into_core()?;

        earliest
            .map(|value| parse_date(&value).map_err(marketfeed_core::Error::from))
            .transpose()
    }
}
