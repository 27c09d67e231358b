use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::types::SymbolToken;

/// Exchange segment as published in the broker's instrument catalog (`exch_seg`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExchangeSegment {
    /// NSE cash market
    Nse,
    /// BSE cash market
    Bse,
    /// NSE futures & options
    Nfo,
    /// BSE futures & options
    Bfo,
    /// Multi Commodity Exchange
    Mcx,
    /// NSE currency derivatives
    Cds,
    /// Any segment this crate has no special handling for
    Other(String),
}

impl ExchangeSegment {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
            Self::Nfo => "NFO",
            Self::Bfo => "BFO",
            Self::Mcx => "MCX",
            Self::Cds => "CDS",
            Self::Other(code) => code.as_str(),
        }
    }
}

impl FromStr for ExchangeSegment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NSE" => Self::Nse,
            "BSE" => Self::Bse,
            "NFO" => Self::Nfo,
            "BFO" => Self::Bfo,
            "MCX" => Self::Mcx,
            "CDS" => Self::Cds,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for ExchangeSegment {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(segment) => segment,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExchangeSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ExchangeSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ExchangeSegment::from(raw.as_str()))
    }
}

/// Tokens grouped by exchange segment, preserving insertion order.
///
/// Exchanges keep the order in which they were first seen and tokens keep the
/// order in which they were pushed. A token is only kept once per exchange, so
/// a request built from this map never asks for the same instrument twice.
///
/// Serializes as a JSON object (`{"NSE": ["2885"], "NFO": ["35001"]}`), which is
/// the shape the quote endpoint expects for `exchangeTokens`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeTokens {
    groups: Vec<(ExchangeSegment, Vec<SymbolToken>)>,
}

impl ExchangeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a token under its exchange. Returns false if it was already present.
    pub fn push(&mut self, exchange: ExchangeSegment, token: impl Into<SymbolToken>) -> bool {
        let token = token.into();
        match self.groups.iter_mut().find(|(seg, _)| *seg == exchange) {
            Some((_, tokens)) => {
                if tokens.contains(&token) {
                    return false;
                }
                tokens.push(token);
            }
            None => self.groups.push((exchange, vec![token])),
        }
        true
    }

    /// Appends a chunk of tokens under an exchange, skipping tokens already present.
    pub fn extend<I, T>(&mut self, exchange: &ExchangeSegment, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<SymbolToken>,
    {
        for token in tokens {
            self.push(exchange.clone(), token);
        }
    }

    /// Total number of tokens across all exchanges.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|(_, tokens)| tokens.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, exchange: &ExchangeSegment) -> Option<&[SymbolToken]> {
        self.groups
            .iter()
            .find(|(seg, _)| seg == exchange)
            .map(|(_, tokens)| tokens.as_slice())
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &ExchangeSegment> {
        self.groups.iter().map(|(seg, _)| seg)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExchangeSegment, &[SymbolToken])> {
        self.groups
            .iter()
            .map(|(seg, tokens)| (seg, tokens.as_slice()))
    }

    /// Flattens the map into `(exchange, token)` pairs in request order.
    pub fn pairs(&self) -> impl Iterator<Item = (&ExchangeSegment, &SymbolToken)> {
        self.groups
            .iter()
            .flat_map(|(seg, tokens)| tokens.iter().map(move |t| (seg, t)))
    }
}

impl<E, T> FromIterator<(E, T)> for ExchangeTokens
where
    E: Into<ExchangeSegment>,
    T: Into<SymbolToken>,
{
    fn from_iter<I: IntoIterator<Item = (E, T)>>(iter: I) -> Self {
        let mut map = ExchangeTokens::new();
        for (exchange, token) in iter {
            map.push(exchange.into(), token);
        }
        map
    }
}

impl Serialize for ExchangeTokens {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (exchange, tokens) in &self.groups {
            map.serialize_entry(exchange.as_str(), tokens)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_parse_is_case_insensitive() {
        assert_eq!(ExchangeSegment::from("nfo"), ExchangeSegment::Nfo);
        assert_eq!(ExchangeSegment::from(" NSE "), ExchangeSegment::Nse);
        assert_eq!(
            ExchangeSegment::from("NCDEX"),
            ExchangeSegment::Other("NCDEX".to_string())
        );
    }

    #[test]
    fn test_push_keeps_first_seen_order_and_skips_duplicates() {
        let mut map = ExchangeTokens::new();
        assert!(map.push(ExchangeSegment::Nfo, "35001"));
        assert!(map.push(ExchangeSegment::Nse, "2885"));
        assert!(map.push(ExchangeSegment::Nfo, "35002"));
        assert!(!map.push(ExchangeSegment::Nfo, "35001"));

        let exchanges: Vec<_> = map.exchanges().cloned().collect();
        assert_eq!(exchanges, vec![ExchangeSegment::Nfo, ExchangeSegment::Nse]);
        assert_eq!(map.get(&ExchangeSegment::Nfo).unwrap(), &["35001", "35002"]);
        assert_eq!(map.total(), 3);
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let map: ExchangeTokens = vec![("NSE", "2885"), ("NFO", "35001"), ("NSE", "11536")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"NSE":["2885","11536"],"NFO":["35001"]}"#);
    }
}
