use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use rust_decimal::Decimal;

use marketfeed_core::acquisition::MarketHours;
use marketfeed_core::settings::{AcquisitionSettings, ResolverSettings, StrikeDistanceDefaults};
use marketfeed_core::{Error, Result};
use marketfeed_market_data::{
    SmartApiCredentials, SmartApiOptions, DEFAULT_CATALOG_URL, DEFAULT_MAX_TOKENS_PER_REQUEST,
};

/// Collector configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: SmartApiCredentials,
    pub smartapi_base_url: String,
    pub catalog_url: String,
    pub data_dir: String,
    pub recover_on_corruption: bool,
    pub force_token_refresh: bool,
    pub resolver: ResolverSettings,
    pub acquisition: AcquisitionSettings,
}

impl Config {
    /// Load `.env` if present, then read `MF_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let credentials = SmartApiCredentials {
            api_key: vars.required("MF_SMARTAPI_API_KEY")?,
            client_code: vars.required("MF_SMARTAPI_CLIENT_CODE")?,
            jwt_token: vars.required("MF_SMARTAPI_JWT")?,
        };

        let defaults = AcquisitionSettings::default();
        let default_hours = MarketHours::default();

        let market_hours = MarketHours {
            open: vars.parse_with("MF_MARKET_OPEN", default_hours.open, parse_time)?,
            close: vars.parse_with("MF_MARKET_CLOSE", default_hours.close, parse_time)?,
            timezone: vars.parse("MF_MARKET_TIMEZONE", default_hours.timezone)?,
            trading_days: default_hours.trading_days,
        };

        let strike_distance = StrikeDistanceDefaults {
            default_distance: vars.parse(
                "MF_STRIKE_DISTANCE_DEFAULT",
                defaults.strike_distance.default_distance,
            )?,
            overrides: vars.parse_with(
                "MF_STRIKE_DISTANCE_OVERRIDES",
                HashMap::new(),
                parse_overrides,
            )?,
        };

        let acquisition = AcquisitionSettings {
            refresh_interval: Duration::from_secs(vars.parse(
                "MF_REFRESH_INTERVAL_SECS",
                defaults.refresh_interval.as_secs(),
            )?),
            market_hours,
            wait_for_market_open: vars.flag(
                "MF_WAIT_FOR_MARKET_OPEN",
                defaults.wait_for_market_open,
            )?,
            wait_increment: Duration::from_secs(vars.parse(
                "MF_WAIT_INCREMENT_SECS",
                defaults.wait_increment.as_secs(),
            )?),
            quote_mode: vars.parse("MF_QUOTE_MODE", defaults.quote_mode)?,
            max_tokens_per_request: vars.parse(
                "MF_MAX_TOKENS_PER_REQUEST",
                defaults.max_tokens_per_request,
            )?,
            inter_batch_delay: Duration::from_millis(vars.parse(
                "MF_INTER_BATCH_DELAY_MS",
                defaults.inter_batch_delay.as_millis() as u64,
            )?),
            include_equity: vars.flag("MF_INCLUDE_EQUITY", defaults.include_equity)?,
            include_futures: vars.flag("MF_INCLUDE_FUTURES", defaults.include_futures)?,
            include_options: vars.flag("MF_INCLUDE_OPTIONS", defaults.include_options)?,
            atm_only: vars.flag("MF_ATM_ONLY", defaults.atm_only)?,
            strike_buffer: vars.parse("MF_STRIKE_BUFFER", defaults.strike_buffer)?,
            exact_atm_only: vars.flag("MF_EXACT_ATM_ONLY", defaults.exact_atm_only)?,
            equity_limit: vars.optional("MF_EQUITY_LIMIT")?,
            futures_limit: vars.optional("MF_FUTURES_LIMIT")?,
            options_limit: vars.optional("MF_OPTIONS_LIMIT")?,
            strike_distance,
        };
        acquisition.validate(DEFAULT_MAX_TOKENS_PER_REQUEST)?;

        Ok(Self {
            credentials,
            smartapi_base_url: vars
                .get("MF_SMARTAPI_BASE_URL")
                .unwrap_or_else(|| SmartApiOptions::default().base_url),
            catalog_url: vars
                .get("MF_CATALOG_URL")
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            data_dir: vars.get("MF_DATA_DIR").unwrap_or_else(|| "./data".to_string()),
            recover_on_corruption: vars.flag("MF_DB_RECOVER_ON_CORRUPTION", false)?,
            force_token_refresh: vars.flag("MF_FORCE_TOKEN_REFRESH", false)?,
            resolver: ResolverSettings::default(),
            acquisition,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::MissingConfigKey(key.to_string()))
    }

    fn parse_with<T, E, P>(&self, key: &str, default: T, parse: P) -> Result<T>
    where
        E: std::fmt::Display,
        P: Fn(&str) -> std::result::Result<T, E>,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse(&raw).map_err(|e| {
                Error::InvalidConfigValue(format!("{}='{}': {}", key, raw, e))
            }),
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse_with(key, default, T::from_str)
    }

    fn optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse_with(key, None, |raw| T::from_str(raw).map(Some))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        self.parse_with(key, default, parse_bool)
    }
}

fn parse_bool(raw: &str) -> std::result::Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}

fn parse_time(raw: &str) -> std::result::Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
}

/// `NAME=gap` pairs separated by commas, e.g. `NIFTY=50,BANKNIFTY=100`.
fn parse_overrides(raw: &str) -> std::result::Result<HashMap<String, Decimal>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, gap) = pair
                .split_once('=')
                .ok_or_else(|| format!("'{}' is not NAME=gap", pair))?;
            let gap = Decimal::from_str(gap.trim()).map_err(|e| format!("'{}': {}", pair, e))?;
            Ok((name.trim().to_ascii_uppercase(), gap))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketfeed_market_data::QuoteMode;
    use rust_decimal_macros::dec;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("MF_SMARTAPI_API_KEY", "key"),
        ("MF_SMARTAPI_CLIENT_CODE", "A123"),
        ("MF_SMARTAPI_JWT", "jwt"),
    ];

    fn with_credentials(extra: &[(&str, &str)]) -> Config {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend_from_slice(extra);
        Config::from_lookup(lookup(&pairs)).unwrap()
    }

    #[test]
    fn test_defaults_with_only_credentials() {
        let config = with_credentials(&[]);

        assert_eq!(config.credentials.client_code, "A123");
        assert_eq!(config.data_dir, "./data");
        assert_eq!(config.catalog_url, DEFAULT_CATALOG_URL);
        assert!(!config.recover_on_corruption);
        assert_eq!(config.acquisition, AcquisitionSettings::default());
    }

    #[test]
    fn test_missing_credential_fails_fast() {
        let err = Config::from_lookup(lookup(&CREDENTIALS[..2])).unwrap_err();
        assert!(matches!(err, Error::MissingConfigKey(ref key) if key == "MF_SMARTAPI_JWT"));

        let mut pairs = CREDENTIALS.to_vec();
        pairs[0] = ("MF_SMARTAPI_API_KEY", "  ");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, Error::MissingConfigKey(ref key) if key == "MF_SMARTAPI_API_KEY"));
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = with_credentials(&[
            ("MF_REFRESH_INTERVAL_SECS", "30"),
            ("MF_MARKET_OPEN", "09:00"),
            ("MF_MARKET_CLOSE", "15:29:59"),
            ("MF_QUOTE_MODE", "ltp"),
            ("MF_MAX_TOKENS_PER_REQUEST", "25"),
            ("MF_INCLUDE_EQUITY", "false"),
            ("MF_EXACT_ATM_ONLY", "yes"),
            ("MF_OPTIONS_LIMIT", "200"),
            ("MF_STRIKE_DISTANCE_OVERRIDES", "nifty=50, BANKNIFTY=100"),
            ("MF_DB_RECOVER_ON_CORRUPTION", "true"),
        ]);

        let acq = &config.acquisition;
        assert_eq!(acq.refresh_interval, Duration::from_secs(30));
        assert_eq!(acq.market_hours.open, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(acq.market_hours.close, NaiveTime::from_hms_opt(15, 29, 59).unwrap());
        assert_eq!(acq.quote_mode, QuoteMode::Ltp);
        assert_eq!(acq.max_tokens_per_request, 25);
        assert!(!acq.include_equity);
        assert!(acq.exact_atm_only);
        assert_eq!(acq.options_limit, Some(200));
        assert_eq!(acq.equity_limit, None);
        assert_eq!(acq.strike_distance.for_underlying("NIFTY"), dec!(50));
        assert_eq!(acq.strike_distance.for_underlying("BANKNIFTY"), dec!(100));
        assert!(config.recover_on_corruption);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for (key, value) in [
            ("MF_REFRESH_INTERVAL_SECS", "soon"),
            ("MF_INCLUDE_OPTIONS", "maybe"),
            ("MF_MARKET_TIMEZONE", "Mars/Olympus"),
            ("MF_QUOTE_MODE", "DEPTH"),
            ("MF_STRIKE_DISTANCE_OVERRIDES", "NIFTY"),
            ("MF_MAX_TOKENS_PER_REQUEST", "51"),
            ("MF_REFRESH_INTERVAL_SECS", "0"),
        ] {
            let mut pairs = CREDENTIALS.to_vec();
            pairs.push((key, value));
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfigValue(_)),
                "{}={} should be rejected, got {:?}",
                key,
                value,
                err
            );
        }
    }
}
