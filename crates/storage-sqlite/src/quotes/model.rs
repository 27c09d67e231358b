//! Database model for quote snapshots.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::errors::StorageError;
use crate::instruments::model::{parse_decimal, parse_optional_decimal};
use marketfeed_core::quotes::StoredQuote;
use marketfeed_market_data::{ExchangeSegment, MarketDepth, QuoteSnapshot};

/// Exchange-local timestamps are stored without an offset.
const EXCHANGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ingest time as fixed-width UTC text, so text order is time order.
pub fn ingest_key(ingested_at: DateTime<Utc>) -> String {
    ingested_at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Database model for one quote snapshot.
///
/// Decimals are stored as text to keep their exact scale. Depth is stored as
/// JSON and omitted when the snapshot carried none.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::quotes)]
#[diesel(primary_key(symbol_token, ingested_at))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuoteDB {
    pub symbol_token: String,
    pub ingested_at: String,
    pub exchange: String,
    pub trading_symbol: Option<String>,
    pub ltp: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub net_change: Option<String>,
    pub percent_change: Option<String>,
    pub avg_price: Option<String>,
    pub last_trade_qty: Option<i64>,
    pub volume: Option<i64>,
    pub open_interest: Option<i64>,
    pub lower_circuit: Option<String>,
    pub upper_circuit: Option<String>,
    pub total_buy_qty: Option<i64>,
    pub total_sell_qty: Option<i64>,
    pub week_low_52: Option<String>,
    pub week_high_52: Option<String>,
    pub depth: Option<String>,
    pub feed_timestamp: Option<String>,
    pub trade_timestamp: Option<String>,
}

fn text(value: Option<Decimal>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn format_time(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|t| t.format(EXCHANGE_TIME_FORMAT).to_string())
}

fn parse_time(value: Option<&str>) -> Result<Option<NaiveDateTime>, StorageError> {
    value
        .map(|v| {
            NaiveDateTime::parse_from_str(v, EXCHANGE_TIME_FORMAT).map_err(|e| {
                StorageError::SerializationError(format!("'{}' is not a timestamp: {}", v, e))
            })
        })
        .transpose()
}

impl QuoteDB {
    pub fn from_snapshot(
        ingested_at: DateTime<Utc>,
        snapshot: &QuoteSnapshot,
    ) -> Result<Self, StorageError> {
        let depth = if snapshot.depth.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&snapshot.depth)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))?,
            )
        };

        Ok(Self {
            symbol_token: snapshot.symbol_token.clone(),
            ingested_at: ingest_key(ingested_at),
            exchange: snapshot.exchange.to_string(),
            trading_symbol: snapshot.trading_symbol.clone(),
            ltp: snapshot.ltp.to_string(),
            open: text(snapshot.open),
            high: text(snapshot.high),
            low: text(snapshot.low),
            close: text(snapshot.close),
            net_change: text(snapshot.net_change),
            percent_change: text(snapshot.percent_change),
            avg_price: text(snapshot.avg_price),
            last_trade_qty: snapshot.last_trade_qty,
            volume: snapshot.volume,
            open_interest: snapshot.open_interest,
            lower_circuit: text(snapshot.lower_circuit),
            upper_circuit: text(snapshot.upper_circuit),
            total_buy_qty: snapshot.total_buy_qty,
            total_sell_qty: snapshot.total_sell_qty,
            week_low_52: text(snapshot.week_low_52),
            week_high_52: text(snapshot.week_high_52),
            depth,
            feed_timestamp: format_time(snapshot.feed_timestamp),
            trade_timestamp: format_time(snapshot.trade_timestamp),
        })
    }
}

impl TryFrom<QuoteDB> for StoredQuote {
    type Error = StorageError;

    fn try_from(row: QuoteDB) -> Result<Self, Self::Error> {
        let ingested_at = DateTime::parse_from_rfc3339(&row.ingested_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                StorageError::SerializationError(format!(
                    "ingested_at '{}' is not a timestamp: {}",
                    row.ingested_at, e
                ))
            })?;

        let depth = match row.depth.as_deref() {
            Some(json) => serde_json::from_str::<MarketDepth>(json)
                .map_err(|e| StorageError::SerializationError(format!("depth: {}", e)))?,
            None => MarketDepth::default(),
        };

        let snapshot = QuoteSnapshot {
            exchange: ExchangeSegment::from(row.exchange.as_str()),
            ltp: parse_decimal("ltp", &row.ltp)?,
            open: parse_optional_decimal("open", row.open.as_deref())?,
            high: parse_optional_decimal("high", row.high.as_deref())?,
            low: parse_optional_decimal("low", row.low.as_deref())?,
            close: parse_optional_decimal("close", row.close.as_deref())?,
            net_change: parse_optional_decimal("net_change", row.net_change.as_deref())?,
            percent_change: parse_optional_decimal(
                "percent_change",
                row.percent_change.as_deref(),
            )?,
            avg_price: parse_optional_decimal("avg_price", row.avg_price.as_deref())?,
            lower_circuit: parse_optional_decimal("lower_circuit", row.lower_circuit.as_deref())?,
            upper_circuit: parse_optional_decimal("upper_circuit", row.upper_circuit.as_deref())?,
            week_low_52: parse_optional_decimal("week_low_52", row.week_low_52.as_deref())?,
            week_high_52: parse_optional_decimal("week_high_52", row.week_high_52.as_deref())?,
            feed_timestamp: parse_time(row.feed_timestamp.as_deref())?,
            trade_timestamp: parse_time(row.trade_timestamp.as_deref())?,
            depth,
            symbol_token: row.symbol_token,
            trading_symbol: row.trading_symbol,
            last_trade_qty: row.last_trade_qty,
            volume: row.volume,
            open_interest: row.open_interest,
            total_buy_qty: row.total_buy_qty,
            total_sell_qty: row.total_sell_qty,
        };

        Ok(StoredQuote {
            ingested_at,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ingest_key_sorts_as_time() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 6, 4, 30, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);
        assert_eq!(ingest_key(earlier), "2025-01-06T04:30:00.000000Z");
        assert!(ingest_key(earlier) < ingest_key(later));
    }
}
