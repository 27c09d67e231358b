use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;

use super::model::QuoteDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::quotes::dsl as quotes_dsl;
use marketfeed_core::quotes::{QuoteStore, StoredQuote};
use marketfeed_core::{Error, Result};
use marketfeed_market_data::QuoteSnapshot;

pub struct QuoteRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl QuoteRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn into_stored(rows: Vec<QuoteDB>) -> Result<Vec<StoredQuote>> {
    rows.into_iter()
        .map(|row| StoredQuote::try_from(row).map_err(Error::from))
        .collect()
}

#[async_trait]
impl QuoteStore for QuoteRepository {
    async fn upsert_snapshots(
        &self,
        ingested_at: DateTime<Utc>,
        snapshots: &[QuoteSnapshot],
    ) -> Result<usize> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let rows = snapshots
            .iter()
            .map(|snapshot| QuoteDB::from_snapshot(ingested_at, snapshot))
            .collect::<std::result::Result<Vec<_>, StorageError>>()?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for row in &rows {
                    written += diesel::insert_into(quotes_dsl::quotes)
                        .values(row)
                        .on_conflict((quotes_dsl::symbol_token, quotes_dsl::ingested_at))
                        .do_update()
                        .set(row)
                        .execute(conn)
                        .map_err(StorageError::QueryFailed)?;
                }
                Ok(written)
            })
            .await
    }

    fn latest(&self, symbol_token: &str) -> Result<Option<StoredQuote>> {
        let mut conn = get_connection(&self.pool)?;

        let row = quotes_dsl::quotes
            .filter(quotes_dsl::symbol_token.eq(symbol_token))
            .order(quotes_dsl::ingested_at.desc())
            .select(QuoteDB::as_select())
            .first::<QuoteDB>(&mut conn)
            .optional()
            .into_core()?;

        row.map(|r| StoredQuote::try_from(r).map_err(Error::from))
            .transpose()
    }

    fn history(&self, symbol_token: &str, limit: usize) -> Result<Vec<StoredQuote>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = quotes_dsl::quotes
            .filter(quotes_dsl::symbol_token.eq(symbol_token))
            .order(quotes_dsl::ingested_at.desc())
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .select(QuoteDB::as_select())
            .load::<QuoteDB>(&mut conn)
            .into_core()?;

        into_stored(rows)
    }

    fn count(&self) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = quotes_dsl::quotes
            .count()
            .get_result(&mut conn)
            .into_core()?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::{NaiveDate, TimeZone};
    use marketfeed_market_data::{DepthLevel, ExchangeSegment, MarketDepth};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    async fn create_test_repository() -> (QuoteRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();

        let pool = create_pool(&db_path).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (QuoteRepository::new(Arc::clone(&pool), writer), temp_dir)
    }

    fn full_snapshot() -> QuoteSnapshot {
        let mut snapshot = QuoteSnapshot::ltp_only(ExchangeSegment::Nfo, "35001", dec!(1020.50));
        snapshot.trading_symbol = Some("FOO30JAN25FUT".to_string());
        snapshot.open = Some(dec!(1001));
        snapshot.high = Some(dec!(1025.75));
        snapshot.low = Some(dec!(998.10));
        snapshot.close = Some(dec!(1000));
        snapshot.net_change = Some(dec!(20.50));
        snapshot.percent_change = Some(dec!(2.05));
        snapshot.avg_price = Some(dec!(1012.33));
        snapshot.last_trade_qty = Some(250);
        snapshot.volume = Some(1_250_000);
        snapshot.open_interest = Some(3_400_000);
        snapshot.lower_circuit = Some(dec!(900));
        snapshot.upper_circuit = Some(dec!(1100));
        snapshot.total_buy_qty = Some(41_000);
        snapshot.total_sell_qty = Some(39_500);
        snapshot.week_low_52 = Some(dec!(812.40));
        snapshot.week_high_52 = Some(dec!(1190));
        snapshot.depth = MarketDepth {
            buy: vec![DepthLevel {
                price: dec!(1020.45),
                quantity: 500,
                orders: 3,
            }],
            sell: vec![DepthLevel {
                price: dec!(1020.55),
                quantity: 750,
                orders: 4,
            }],
        };
        snapshot.feed_timestamp = NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(10, 0, 1));
        snapshot.trade_timestamp = NaiveDate::from_ymd_opt(2025, 1, 6)
            .and_then(|d| d.and_hms_opt(10, 0, 0));
        snapshot
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 4, 30, second).unwrap()
    }

    #[tokio::test]
    async fn test_full_snapshot_round_trip() {
        let (repo, _temp_dir) = create_test_repository().await;
        let snapshot = full_snapshot();

        let written = repo.upsert_snapshots(at(0), &[snapshot.clone()]).await.unwrap();
        assert_eq!(written, 1);

        let stored = repo.latest("35001").unwrap().unwrap();
        assert_eq!(stored.ingested_at, at(0));
        assert_eq!(stored.snapshot, snapshot);
    }

    #[tokio::test]
    async fn test_upsert_same_key_overwrites_without_new_row() {
        let (repo, _temp_dir) = create_test_repository().await;
        let first = full_snapshot();
        let mut second = QuoteSnapshot::ltp_only(ExchangeSegment::Nfo, "35001", dec!(1021));
        second.volume = Some(1_300_000);

        repo.upsert_snapshots(at(0), &[first]).await.unwrap();
        repo.upsert_snapshots(at(0), &[second.clone()]).await.unwrap();
        repo.upsert_snapshots(at(0), &[second.clone()]).await.unwrap();

        assert_eq!(repo.count().unwrap(), 1);
        let stored = repo.latest("35001").unwrap().unwrap();
        // Absent fields in the newer snapshot are cleared, not kept
        assert_eq!(stored.snapshot, second);
    }

    #[tokio::test]
    async fn test_distinct_ingest_times_add_rows() {
        let (repo, _temp_dir) = create_test_repository().await;
        for second in 0..3 {
            let ltp = dec!(2500) + Decimal::from(second);
            let snapshot = QuoteSnapshot::ltp_only(ExchangeSegment::Nse, "2885", ltp);
            repo.upsert_snapshots(at(second), &[snapshot]).await.unwrap();
        }
        let other = QuoteSnapshot::ltp_only(ExchangeSegment::Nse, "11536", dec!(3900));
        repo.upsert_snapshots(at(0), &[other]).await.unwrap();

        assert_eq!(repo.count().unwrap(), 4);

        let history = repo.history("2885", 2).unwrap();
        let times: Vec<DateTime<Utc>> = history.iter().map(|q| q.ingested_at).collect();
        assert_eq!(times, vec![at(2), at(1)]);
        assert_eq!(history[0].snapshot.ltp, dec!(2502));

        assert_eq!(repo.latest("2885").unwrap().unwrap().ingested_at, at(2));
        assert!(repo.latest("99999").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_upsert_is_a_no_op() {
        let (repo, _temp_dir) = create_test_repository().await;
        assert_eq!(repo.upsert_snapshots(at(0), &[]).await.unwrap(), 0);
        assert_eq!(repo.count().unwrap(), 0);
    }
}
