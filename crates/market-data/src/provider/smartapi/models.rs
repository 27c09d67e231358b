//! Wire types for the SmartAPI REST endpoints.

use chrono::NaiveDateTime;
use log::warn;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    DepthLevel, ExchangeSegment, ExchangeTokens, MarketDepth, QuoteMode, QuoteSnapshot,
    SymbolToken,
};

/// Timestamp format used by `exchFeedTime` / `exchTradeTime`, e.g. `21-Dec-2022 10:46:11`.
pub(crate) const EXCHANGE_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// Body of `POST /market/v1/quote/`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuoteRequest<'a> {
    pub mode: QuoteMode,
    pub exchange_tokens: &'a ExchangeTokens,
}

/// Common envelope of every SmartAPI response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errorcode: String,
    pub data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuoteData {
    #[serde(default)]
    pub fetched: Vec<FetchedQuote>,
    #[serde(default)]
    pub unfetched: Vec<UnfetchedEntry>,
}

/// Entry of the `unfetched` list. The API has returned both bare tokens and
/// objects carrying the token plus an error message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UnfetchedEntry {
    Token(String),
    Detailed {
        #[serde(rename = "symbolToken", default)]
        symbol_token: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl UnfetchedEntry {
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Token(token) => Some(token.as_str()),
            Self::Detailed { symbol_token, .. } => symbol_token.as_deref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDepthLevel {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub orders: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDepth {
    #[serde(default)]
    pub buy: Vec<RawDepthLevel>,
    #[serde(default)]
    pub sell: Vec<RawDepthLevel>,
}

/// One element of `data.fetched`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FetchedQuote {
    pub exchange: String,
    pub symbol_token: String,
    #[serde(default)]
    pub trading_symbol: Option<String>,
    #[serde(default)]
    pub ltp: Option<f64>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub last_trade_qty: Option<i64>,
    #[serde(default)]
    pub exch_feed_time: Option<String>,
    #[serde(default)]
    pub exch_trade_time: Option<String>,
    #[serde(default)]
    pub net_change: Option<f64>,
    #[serde(default)]
    pub percent_change: Option<f64>,
    #[serde(default)]
    pub avg_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub trade_volume: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub opn_interest: Option<i64>,
    #[serde(default)]
    pub lower_circuit: Option<f64>,
    #[serde(default)]
    pub upper_circuit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub tot_buy_quan: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub tot_sell_quan: Option<i64>,
    #[serde(rename = "52WeekLow", default)]
    pub week_low_52: Option<f64>,
    #[serde(rename = "52WeekHigh", default)]
    pub week_high_52: Option<f64>,
    #[serde(default)]
    pub depth: Option<RawDepth>,
}

impl FetchedQuote {
    /// Converts the wire row into a snapshot. Rows without a usable last
    /// traded price are rejected and returned as their token.
    pub fn into_snapshot(self) -> Result<QuoteSnapshot, SymbolToken> {
        let Some(ltp) = self.ltp.and_then(Decimal::from_f64) else {
            warn!(
                "SmartAPI quote for token {} has no last traded price, treating as unfetched",
                self.symbol_token
            );
            return Err(self.symbol_token);
        };

        let depth = self
            .depth
            .map(|raw| MarketDepth {
                buy: convert_levels(raw.buy),
                sell: convert_levels(raw.sell),
            })
            .unwrap_or_default();

        Ok(QuoteSnapshot {
            exchange: ExchangeSegment::from(self.exchange.as_str()),
            symbol_token: self.symbol_token,
            trading_symbol: self.trading_symbol,
            ltp,
            open: to_decimal(self.open),
            high: to_decimal(self.high),
            low: to_decimal(self.low),
            close: to_decimal(self.close),
            net_change: to_decimal(self.net_change),
            percent_change: to_decimal(self.percent_change),
            avg_price: to_decimal(self.avg_price),
            last_trade_qty: self.last_trade_qty,
            volume: self.trade_volume,
            open_interest: self.opn_interest,
            lower_circuit: to_decimal(self.lower_circuit),
            upper_circuit: to_decimal(self.upper_circuit),
            total_buy_qty: self.tot_buy_quan,
            total_sell_qty: self.tot_sell_quan,
            week_low_52: to_decimal(self.week_low_52),
            week_high_52: to_decimal(self.week_high_52),
            depth,
            feed_timestamp: parse_exchange_time(self.exch_feed_time.as_deref()),
            trade_timestamp: parse_exchange_time(self.exch_trade_time.as_deref()),
        })
    }
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

fn convert_levels(levels: Vec<RawDepthLevel>) -> Vec<DepthLevel> {
    levels
        .into_iter()
        .filter_map(|level| {
            Some(DepthLevel {
                price: to_decimal(level.price)?,
                quantity: level.quantity.unwrap_or_default(),
                orders: level.orders.unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_exchange_time(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDateTime::parse_from_str(raw, EXCHANGE_TIME_FORMAT) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!("Unparsable SmartAPI exchange time '{}': {}", raw, e);
            None
        }
    }
}

/// Accepts integers that were serialised as floats or strings.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(serde_json::Value::String(s)) => {
            s.trim().parse::<f64>().ok().map(|f| f.round() as i64)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const FULL_RESPONSE: &str = r#"{
        "status": true,
        "message": "SUCCESS",
        "errorcode": "",
        "data": {
            "fetched": [{
                "exchange": "NSE",
                "tradingSymbol": "SBIN-EQ",
                "symbolToken": "3045",
                "ltp": 568.2,
                "open": 567.4,
                "high": 569.35,
                "low": 566.1,
                "close": 567.4,
                "lastTradeQty": 46,
                "exchFeedTime": "21-Dec-2022 10:46:11",
                "exchTradeTime": "21-Dec-2022 10:46:10",
                "netChange": 0.8,
                "percentChange": 0.14,
                "avgPrice": 567.83,
                "tradeVolume": 3556150,
                "opnInterest": 0,
                "lowerCircuit": 511.1,
                "upperCircuit": 624.6,
                "totBuyQuan": 839549,
                "totSellQuan": 1284767,
                "52WeekLow": 430.7,
                "52WeekHigh": 629.55,
                "depth": {
                    "buy": [{"price": 568.2, "quantity": 511, "orders": 2}],
                    "sell": [{"price": 568.25, "quantity": 1000.0, "orders": 1}]
                }
            }, {
                "exchange": "NFO",
                "tradingSymbol": "SBIN25JANFUT",
                "symbolToken": "35001"
            }],
            "unfetched": [
                {"exchange": "NSE", "symbolToken": "99999", "message": "Invalid token", "errorCode": "AB4008"},
                "88888"
            ]
        }
    }"#;

    #[test]
    fn test_decodes_full_mode_response() {
        let envelope: Envelope<QuoteData> = serde_json::from_str(FULL_RESPONSE).unwrap();
        assert!(envelope.status);
        let data = envelope.data.unwrap();
        assert_eq!(data.fetched.len(), 2);

        let tokens: Vec<_> = data.unfetched.iter().filter_map(|u| u.token()).collect();
        assert_eq!(tokens, vec!["99999", "88888"]);

        let mut rows = data.fetched.into_iter();
        let snapshot = rows.next().unwrap().into_snapshot().unwrap();
        assert_eq!(snapshot.exchange, ExchangeSegment::Nse);
        assert_eq!(snapshot.symbol_token, "3045");
        assert_eq!(snapshot.ltp, dec!(568.2));
        assert_eq!(snapshot.week_high_52, Some(dec!(629.55)));
        assert_eq!(snapshot.volume, Some(3556150));
        assert_eq!(snapshot.depth.sell[0].quantity, 1000);
        assert_eq!(
            snapshot.feed_timestamp,
            NaiveDate::from_ymd_opt(2022, 12, 21)
                .unwrap()
                .and_hms_opt(10, 46, 11)
        );

        // Second row carries no price
        assert_eq!(rows.next().unwrap().into_snapshot().unwrap_err(), "35001");
    }

    #[test]
    fn test_request_body_shape() {
        let tokens: ExchangeTokens = vec![("NSE", "3045"), ("NFO", "35001")].into_iter().collect();
        let body = serde_json::to_value(QuoteRequest {
            mode: QuoteMode::Ltp,
            exchange_tokens: &tokens,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "mode": "LTP",
                "exchangeTokens": {"NSE": ["3045"], "NFO": ["35001"]}
            })
        );
    }
}
