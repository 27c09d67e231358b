use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::exchange::ExchangeSegment;
use super::types::SymbolToken;

/// Instrument type code from the catalog's `instrumenttype` column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstrumentType {
    /// `FUTSTK` - single stock future
    FuturesStock,
    /// `OPTSTK` - single stock option
    OptionsStock,
    /// `FUTIDX` - index future
    FuturesIndex,
    /// `OPTIDX` - index option
    OptionsIndex,
    /// Empty code, used by cash-market rows
    Cash,
    Other(String),
}

impl InstrumentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::FuturesStock => "FUTSTK",
            Self::OptionsStock => "OPTSTK",
            Self::FuturesIndex => "FUTIDX",
            Self::OptionsIndex => "OPTIDX",
            Self::Cash => "",
            Self::Other(code) => code.as_str(),
        }
    }
}

impl From<&str> for InstrumentType {
    fn from(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "FUTSTK" => Self::FuturesStock,
            "OPTSTK" => Self::OptionsStock,
            "FUTIDX" => Self::FuturesIndex,
            "OPTIDX" => Self::OptionsIndex,
            "" => Self::Cash,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for InstrumentType {
    fn from(code: String) -> Self {
        InstrumentType::from(code.as_str())
    }
}

impl From<InstrumentType> for String {
    fn from(kind: InstrumentType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the broker's instrument catalog.
///
/// Records are immutable snapshots of a catalog download. The expiry is kept as
/// the raw catalog string (e.g. `"30JAN2025"`); parsing it is the resolver's job
/// so that a malformed value only drops its own row.
///
/// Prices (`strike`, `tick_size`) are already normalised to rupees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub token: SymbolToken,
    pub symbol: String,
    pub name: String,
    pub exchange_segment: ExchangeSegment,
    pub instrument_type: InstrumentType,
    pub expiry: Option<String>,
    pub strike: Option<Decimal>,
    pub lot_size: i64,
    pub tick_size: Decimal,
}

impl InstrumentRecord {
    /// True when the three identity fields are all non-blank.
    pub fn has_identity(&self) -> bool {
        !self.token.trim().is_empty()
            && !self.symbol.trim().is_empty()
            && !self.name.trim().is_empty()
    }
}
