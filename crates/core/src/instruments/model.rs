//! Resolved instrument models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marketfeed_market_data::{ExchangeSegment, InstrumentType, SymbolToken};

/// Role of a token in the collected universe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenType {
    Futures,
    Options,
    Equity,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Futures => "FUTURES",
            Self::Options => "OPTIONS",
            Self::Equity => "EQUITY",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FUTURES" => Ok(Self::Futures),
            "OPTIONS" => Ok(Self::Options),
            "EQUITY" => Ok(Self::Equity),
            other => Err(format!("unknown token type '{}'", other)),
        }
    }
}

/// Call or put, read from the trading symbol's `CE` / `PE` suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionSide {
    Call,
    Put,
}

/// A catalog row selected for collection.
///
/// Equity rows carry no strike or expiry and point at their underlying's
/// futures token. Options rows carry the strike distance computed for their
/// underlying, or `None` when the catalog listed fewer than two strikes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedToken {
    pub token: SymbolToken,
    pub symbol: String,
    pub name: String,
    pub exchange_segment: ExchangeSegment,
    pub instrument_type: InstrumentType,
    pub expiry: Option<NaiveDate>,
    pub strike: Option<Decimal>,
    pub lot_size: i64,
    pub tick_size: Decimal,
    pub token_type: TokenType,
    pub futures_token: Option<SymbolToken>,
    pub strike_distance: Option<Decimal>,
}

impl ResolvedToken {
    pub fn option_side(&self) -> Option<OptionSide> {
        if self.token_type != TokenType::Options {
            return None;
        }
        let symbol = self.symbol.trim_end().to_ascii_uppercase();
        if symbol.ends_with("CE") {
            Some(OptionSide::Call)
        } else if symbol.ends_with("PE") {
            Some(OptionSide::Put)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(symbol: &str) -> ResolvedToken {
        ResolvedToken {
            token: "1".to_string(),
            symbol: symbol.to_string(),
            name: "FOO".to_string(),
            exchange_segment: ExchangeSegment::Nfo,
            instrument_type: InstrumentType::OptionsStock,
            expiry: None,
            strike: None,
            lot_size: 1,
            tick_size: Decimal::ZERO,
            token_type: TokenType::Options,
            futures_token: None,
            strike_distance: None,
        }
    }

    #[test]
    fn test_option_side_from_symbol_suffix() {
        assert_eq!(option("FOO30JAN251000CE").option_side(), Some(OptionSide::Call));
        assert_eq!(option("FOO30JAN251000PE").option_side(), Some(OptionSide::Put));
        assert_eq!(option("FOO30JAN25FUT").option_side(), None);

        let mut future = option("FOO30JAN25CE");
        future.token_type = TokenType::Futures;
        assert_eq!(future.option_side(), None);
    }

    #[test]
    fn test_token_type_round_trip() {
        for kind in [TokenType::Futures, TokenType::Options, TokenType::Equity] {
            assert_eq!(kind.as_str().parse::<TokenType>().unwrap(), kind);
        }
        assert!("INDEX".parse::<TokenType>().is_err());
    }
}
