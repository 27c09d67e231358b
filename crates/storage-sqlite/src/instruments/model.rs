//! Database models for the resolved token universe.

use std::str::FromStr;

use chrono::NaiveDate;
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::errors::StorageError;
use marketfeed_core::instruments::{ResolvedToken, TokenType};
use marketfeed_market_data::{ExchangeSegment, InstrumentType};

/// Stored date format for expiries.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of bound columns in [`TokenDB`].
pub const TOKEN_COLUMNS: usize = 13;

/// Database model for a resolved token.
///
/// `position` preserves resolution order across the whole universe.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TokenDB {
    pub position: i32,
    pub token: String,
    pub symbol: String,
    pub name: String,
    pub exchange_segment: String,
    pub instrument_type: String,
    pub expiry: Option<String>,
    pub strike: Option<String>,
    pub lot_size: i64,
    pub tick_size: String,
    pub token_type: String,
    pub futures_token: Option<String>,
    pub strike_distance: Option<String>,
}

/// Database model for the single refresh marker row.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::token_refreshes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TokenRefreshDB {
    pub id: i32,
    pub refreshed_at: String,
    pub token_count: i64,
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value).map_err(|e| {
        StorageError::SerializationError(format!("{} '{}' is not a decimal: {}", column, value, e))
    })
}

pub(crate) fn parse_optional_decimal(
    column: &str,
    value: Option<&str>,
) -> Result<Option<Decimal>, StorageError> {
    value.map(|v| parse_decimal(column, v)).transpose()
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        StorageError::SerializationError(format!("expiry '{}' is not a date: {}", value, e))
    })
}

impl TokenDB {
    pub fn from_domain(position: i32, token: &ResolvedToken) -> Self {
        Self {
            position,
            token: token.token.clone(),
            symbol: token.symbol.clone(),
            name: token.name.clone(),
            exchange_segment: token.exchange_segment.to_string(),
            instrument_type: token.instrument_type.to_string(),
            expiry: token.expiry.map(|d| d.format(DATE_FORMAT).to_string()),
            strike: token.strike.map(|s| s.to_string()),
            lot_size: token.lot_size,
            tick_size: token.tick_size.to_string(),
            token_type: token.token_type.as_str().to_string(),
            futures_token: token.futures_token.clone(),
            strike_distance: token.strike_distance.map(|d| d.to_string()),
        }
    }
}

impl TryFrom<TokenDB> for ResolvedToken {
    type Error = StorageError;

    fn try_from(row: TokenDB) -> Result<Self, Self::Error> {
        let token_type =
            TokenType::from_str(&row.token_type).map_err(StorageError::SerializationError)?;

        Ok(ResolvedToken {
            expiry: row.expiry.as_deref().map(parse_date).transpose()?,
            strike: parse_optional_decimal("strike", row.strike.as_deref())?,
            tick_size: parse_decimal("tick_size", &row.tick_size)?,
            strike_distance: parse_optional_decimal(
                "strike_distance",
                row.strike_distance.as_deref(),
            )?,
            exchange_segment: ExchangeSegment::from(row.exchange_segment.as_str()),
            instrument_type: InstrumentType::from(row.instrument_type),
            token: row.token,
            symbol: row.symbol,
            name: row.name,
            lot_size: row.lot_size,
            token_type,
            futures_token: row.futures_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_option_row_round_trip_keeps_all_fields() {
        let token = ResolvedToken {
            token: "35001".to_string(),
            symbol: "FOO30JAN251000CE".to_string(),
            name: "FOO".to_string(),
            exchange_segment: ExchangeSegment::Nfo,
            instrument_type: InstrumentType::OptionsStock,
            expiry: NaiveDate::from_ymd_opt(2025, 1, 30),
            strike: Some(dec!(1000)),
            lot_size: 250,
            tick_size: dec!(0.05),
            token_type: TokenType::Options,
            futures_token: None,
            strike_distance: Some(dec!(50)),
        };

        let row = TokenDB::from_domain(7, &token);
        assert_eq!(row.expiry.as_deref(), Some("2025-01-30"));
        assert_eq!(row.instrument_type, "OPTSTK");
        assert_eq!(row.token_type, "OPTIONS");

        assert_eq!(ResolvedToken::try_from(row).unwrap(), token);
    }

    #[test]
    fn test_bad_decimal_is_a_serialization_error() {
        let err = parse_decimal("strike", "12x").unwrap_err();
        assert!(matches!(err, StorageError::SerializationError(_)));
    }
}
