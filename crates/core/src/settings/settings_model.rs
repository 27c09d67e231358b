//! Runtime settings for resolution and acquisition.
//!
//! Settings are plain structs built once at startup (see the collector's
//! `Config::from_env`) and handed to the components that need them.

use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::acquisition::MarketHours;
use crate::errors::{Error, Result};
use marketfeed_market_data::{ExchangeSegment, QuoteMode, DEFAULT_MAX_TOKENS_PER_REQUEST};

/// Fallback strike gaps used when an underlying's distance could not be
/// computed from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrikeDistanceDefaults {
    pub default_distance: Decimal,
    /// Per-underlying overrides, keyed by underlying name.
    #[serde(default)]
    pub overrides: HashMap<String, Decimal>,
}

impl StrikeDistanceDefaults {
    pub fn for_underlying(&self, name: &str) -> Decimal {
        self.overrides
            .get(name)
            .copied()
            .unwrap_or(self.default_distance)
    }
}

impl Default for StrikeDistanceDefaults {
    fn default() -> Self {
        Self {
            default_distance: Decimal::TEN,
            overrides: HashMap::new(),
        }
    }
}

/// How the catalog is read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Segment listing stock futures and options.
    pub derivatives_segment: ExchangeSegment,
    /// Segment listing the cash equities.
    pub cash_segment: ExchangeSegment,
    /// `strftime` format of the catalog's expiry column.
    pub expiry_format: String,
    /// Suffix appended to an underlying name to form its equity symbol.
    pub equity_suffix: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            derivatives_segment: ExchangeSegment::Nfo,
            cash_segment: ExchangeSegment::Nse,
            expiry_format: "%d%b%Y".to_string(),
            equity_suffix: "-EQ".to_string(),
        }
    }
}

/// Controls for the acquisition loop.
#[derive(Clone, Debug, PartialEq)]
pub struct AcquisitionSettings {
    /// Target time between the starts of two cycles.
    pub refresh_interval: Duration,
    pub market_hours: MarketHours,
    /// Wait for today's open before starting cycles.
    pub wait_for_market_open: bool,
    /// Longest uninterrupted sleep while waiting for the open.
    pub wait_increment: Duration,
    pub quote_mode: QuoteMode,
    pub max_tokens_per_request: usize,
    pub inter_batch_delay: Duration,
    pub include_equity: bool,
    pub include_futures: bool,
    pub include_options: bool,
    /// Restrict options to strikes around the futures price.
    pub atm_only: bool,
    /// Strikes on each side of the futures price kept in buffered mode.
    pub strike_buffer: u32,
    /// Keep only the single nearest call and put per underlying.
    pub exact_atm_only: bool,
    pub equity_limit: Option<usize>,
    pub futures_limit: Option<usize>,
    pub options_limit: Option<usize>,
    pub strike_distance: StrikeDistanceDefaults,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            market_hours: MarketHours::default(),
            wait_for_market_open: true,
            wait_increment: Duration::from_secs(30),
            quote_mode: QuoteMode::Full,
            max_tokens_per_request: DEFAULT_MAX_TOKENS_PER_REQUEST,
            inter_batch_delay: Duration::from_secs(1),
            include_equity: true,
            include_futures: true,
            include_options: true,
            atm_only: true,
            strike_buffer: 1,
            exact_atm_only: false,
            equity_limit: None,
            futures_limit: None,
            options_limit: None,
            strike_distance: StrikeDistanceDefaults::default(),
        }
    }
}

impl AcquisitionSettings {
    /// Rejects values the loop cannot run with.
    ///
    /// `provider_max` is the provider's own per-request token limit.
    pub fn validate(&self, provider_max: usize) -> Result<()> {
        if self.refresh_interval.is_zero() {
            return Err(Error::InvalidConfigValue(
                "refresh interval must be greater than zero".to_string(),
            ));
        }
        if self.wait_increment.is_zero() {
            return Err(Error::InvalidConfigValue(
                "wait increment must be greater than zero".to_string(),
            ));
        }
        if self.max_tokens_per_request == 0 || self.max_tokens_per_request > provider_max {
            return Err(Error::InvalidConfigValue(format!(
                "max tokens per request must be between 1 and {}, got {}",
                provider_max, self.max_tokens_per_request
            )));
        }
        if self.market_hours.open >= self.market_hours.close {
            return Err(Error::InvalidConfigValue(format!(
                "market open {} must be before close {}",
                self.market_hours.open, self.market_hours.close
            )));
        }
        if self.strike_distance.default_distance <= Decimal::ZERO
            || self
                .strike_distance
                .overrides
                .values()
                .any(|d| *d <= Decimal::ZERO)
        {
            return Err(Error::InvalidConfigValue(
                "strike distance defaults must be positive".to_string(),
            ));
        }
        if !(self.include_equity || self.include_futures || self.include_options) {
            return Err(Error::InvalidConfigValue(
                "at least one of equity, futures or options must be included".to_string(),
            ));
        }
        Ok(())
    }

    /// Futures are priced whenever options need a reference price, even when
    /// they are not persisted themselves.
    pub fn fetches_futures(&self) -> bool {
        self.include_futures || (self.include_options && self.atm_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AcquisitionSettings::default().validate(50).is_ok());
    }

    #[test]
    fn test_rejects_batch_size_above_provider_limit() {
        let settings = AcquisitionSettings {
            max_tokens_per_request: 51,
            ..AcquisitionSettings::default()
        };
        let err = settings.validate(50).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue(_)));
    }

    #[test]
    fn test_rejects_inverted_market_hours() {
        let mut settings = AcquisitionSettings::default();
        settings.market_hours.open = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert!(settings.validate(50).is_err());
    }

    #[test]
    fn test_rejects_nothing_included() {
        let settings = AcquisitionSettings {
            include_equity: false,
            include_futures: false,
            include_options: false,
            ..AcquisitionSettings::default()
        };
        assert!(settings.validate(50).is_err());
    }

    #[test]
    fn test_futures_fetched_for_atm_reference() {
        let settings = AcquisitionSettings {
            include_futures: false,
            ..AcquisitionSettings::default()
        };
        assert!(settings.fetches_futures());

        let settings = AcquisitionSettings {
            include_futures: false,
            atm_only: false,
            ..AcquisitionSettings::default()
        };
        assert!(!settings.fetches_futures());
    }

    #[test]
    fn test_strike_distance_override() {
        let mut defaults = StrikeDistanceDefaults::default();
        defaults.overrides.insert("NIFTY".to_string(), dec!(50));
        assert_eq!(defaults.for_underlying("NIFTY"), dec!(50));
        assert_eq!(defaults.for_underlying("RELIANCE"), dec!(10));
    }
}
