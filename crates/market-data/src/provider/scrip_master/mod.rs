//! Angel One scrip master catalog client.
//!
//! The broker publishes its complete instrument list as a single public JSON
//! array. Every field is a string; strikes and tick sizes are quoted in paise
//! and a negative strike marks a row without one.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use num_traits::ToPrimitive;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{ExchangeSegment, InstrumentRecord, InstrumentType};
use crate::provider::CatalogSource;

pub const DEFAULT_CATALOG_URL: &str =
    "https://margincalculator.angelbroking.com/OpenAPI_File/files/OpenAPIScripMaster.json";
const PROVIDER_ID: &str = "ANGEL_SCRIP_MASTER";

/// The catalog is tens of megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const PAISE_PER_RUPEE: Decimal = Decimal::ONE_HUNDRED;

/// One catalog row as published.
#[derive(Debug, Default, Deserialize)]
struct ScripRow {
    #[serde(default)]
    token: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    expiry: String,
    #[serde(default)]
    strike: String,
    #[serde(default)]
    lotsize: String,
    #[serde(default)]
    instrumenttype: String,
    #[serde(default)]
    exch_seg: String,
    #[serde(default)]
    tick_size: String,
}

impl ScripRow {
    fn into_record(self) -> InstrumentRecord {
        let strike = parse_decimal(&self.strike)
            .filter(|s| !s.is_sign_negative())
            .map(|s| s / PAISE_PER_RUPEE);
        let tick_size = parse_decimal(&self.tick_size)
            .map(|t| t / PAISE_PER_RUPEE)
            .unwrap_or_default();
        let lot_size = parse_decimal(&self.lotsize)
            .and_then(|l| l.trunc().to_i64())
            .unwrap_or_default();
        let expiry = Some(self.expiry.trim().to_string()).filter(|e| !e.is_empty());

        InstrumentRecord {
            token: self.token.trim().to_string(),
            symbol: self.symbol.trim().to_string(),
            name: self.name.trim().to_string(),
            exchange_segment: ExchangeSegment::from(self.exch_seg.as_str()),
            instrument_type: InstrumentType::from(self.instrumenttype.as_str()),
            expiry,
            strike,
            lot_size,
            tick_size: tick_size.normalize(),
        }
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}

/// Decode a raw catalog payload.
pub fn parse_catalog(body: &str) -> Result<Vec<InstrumentRecord>, MarketDataError> {
    let rows: Vec<ScripRow> = serde_json::from_str(body)
        .map_err(|e| MarketDataError::CatalogUnavailable(format!("invalid catalog JSON: {}", e)))?;
    Ok(rows.into_iter().map(ScripRow::into_record).collect())
}

/// HTTP client for the public scrip master file.
pub struct ScripMasterClient {
    client: Client,
    url: String,
}

impl ScripMasterClient {
    pub fn new(url: impl Into<String>) -> Result<Self, MarketDataError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CatalogSource for ScripMasterClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_catalog(&self) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        debug!("Downloading instrument catalog from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::CatalogUnavailable(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let records = parse_catalog(&body)?;
        info!("Fetched {} instruments from catalog", records.len());
        Ok(records)
    }
}
