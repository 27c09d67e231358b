//! Instrument universe error types.

use thiserror::Error;

use marketfeed_market_data::InstrumentType;

/// Reasons a catalog cannot produce a complete universe.
///
/// Any of these aborts the refresh; the stored universe is left as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No futures rows in the derivatives segment")]
    NoFuturesRows,

    #[error("No options rows in the derivatives segment")]
    NoOptionsRows,

    #[error("No {instrument_type} row has a parsable expiry")]
    NoParsableExpiry { instrument_type: InstrumentType },
}
