use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::exchange::ExchangeSegment;
use super::types::SymbolToken;

/// Level of detail requested from the quote endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteMode {
    /// Everything, including market depth and circuit limits
    #[default]
    Full,
    /// Open/high/low/close plus last traded price
    Ohlc,
    /// Last traded price only
    Ltp,
}

impl QuoteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Ohlc => "OHLC",
            Self::Ltp => "LTP",
        }
    }
}

impl fmt::Display for QuoteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL" => Ok(Self::Full),
            "OHLC" => Ok(Self::Ohlc),
            "LTP" => Ok(Self::Ltp),
            other => Err(format!("unknown quote mode '{}'", other)),
        }
    }
}

/// One price level of the order book.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: i64,
    pub orders: i64,
}

/// Best bids and asks as returned in FULL mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDepth {
    pub buy: Vec<DepthLevel>,
    pub sell: Vec<DepthLevel>,
}

impl MarketDepth {
    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }
}

/// Live quote for a single instrument.
///
/// Only `ltp` is guaranteed in every mode; the remaining fields are populated
/// according to the requested [`QuoteMode`]. Exchange timestamps are exchange
/// local time, as published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub exchange: ExchangeSegment,
    pub symbol_token: SymbolToken,
    pub trading_symbol: Option<String>,
    pub ltp: Decimal,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub net_change: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub avg_price: Option<Decimal>,
    pub last_trade_qty: Option<i64>,
    pub volume: Option<i64>,
    pub open_interest: Option<i64>,
    pub lower_circuit: Option<Decimal>,
    pub upper_circuit: Option<Decimal>,
    pub total_buy_qty: Option<i64>,
    pub total_sell_qty: Option<i64>,
    pub week_low_52: Option<Decimal>,
    pub week_high_52: Option<Decimal>,
    #[serde(default)]
    pub depth: MarketDepth,
    pub feed_timestamp: Option<NaiveDateTime>,
    pub trade_timestamp: Option<NaiveDateTime>,
}

impl QuoteSnapshot {
    /// Create a snapshot carrying only the last traded price.
    pub fn ltp_only(
        exchange: ExchangeSegment,
        symbol_token: impl Into<SymbolToken>,
        ltp: Decimal,
    ) -> Self {
        Self {
            exchange,
            symbol_token: symbol_token.into(),
            trading_symbol: None,
            ltp,
            open: None,
            high: None,
            low: None,
            close: None,
            net_change: None,
            percent_change: None,
            avg_price: None,
            last_trade_qty: None,
            volume: None,
            open_interest: None,
            lower_circuit: None,
            upper_circuit: None,
            total_buy_qty: None,
            total_sell_qty: None,
            week_low_52: None,
            week_high_52: None,
            depth: MarketDepth::default(),
            feed_timestamp: None,
            trade_timestamp: None,
        }
    }
}

/// Result of one quote request.
///
/// `unfetched` lists the tokens the provider acknowledged but could not price;
/// they are expected to be asked for again on a later cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteBatch {
    pub status: bool,
    pub fetched: Vec<QuoteSnapshot>,
    pub unfetched: Vec<SymbolToken>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_mode_parse() {
        assert_eq!("full".parse::<QuoteMode>().unwrap(), QuoteMode::Full);
        assert_eq!("LTP".parse::<QuoteMode>().unwrap(), QuoteMode::Ltp);
        assert!("DEPTH".parse::<QuoteMode>().is_err());
        assert_eq!(serde_json::to_string(&QuoteMode::Ohlc).unwrap(), "\"OHLC\"");
    }

    #[test]
    fn test_ltp_only_snapshot() {
        let snapshot = QuoteSnapshot::ltp_only(ExchangeSegment::Nfo, "35001", dec!(1020.50));
        assert_eq!(snapshot.ltp, dec!(1020.50));
        assert!(snapshot.open.is_none());
        assert!(snapshot.depth.is_empty());
    }
}
