//! Instrument universe resolution.
//!
//! Turns a raw catalog into the set of tokens worth collecting: the nearest
//! expiry stock futures, the nearest expiry stock options (with their strike
//! spacing) and the cash equity of every futures underlying.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use super::errors::ResolutionError;
use super::model::{ResolvedToken, TokenType};
use crate::settings::ResolverSettings;
use marketfeed_market_data::{InstrumentRecord, InstrumentType};

/// Standard gap between adjacent strikes: the most frequent difference
/// between consecutive distinct strikes.
///
/// Returns `None` with fewer than two distinct strikes. When several gaps are
/// equally frequent the smallest one wins.
pub fn strike_distance<I>(strikes: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let distinct: BTreeSet<Decimal> = strikes.into_iter().map(|s| s.normalize()).collect();
    if distinct.len() < 2 {
        return None;
    }

    let mut counts: BTreeMap<Decimal, usize> = BTreeMap::new();
    for (low, high) in distinct.iter().zip(distinct.iter().skip(1)) {
        *counts.entry((*high - *low).normalize()).or_default() += 1;
    }

    // BTreeMap iterates ascending, and max_by_key keeps the last maximum,
    // so iterate in reverse to prefer the smallest gap on ties
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(gap, _)| gap)
}

/// Resolves catalogs into collectable token sets.
#[derive(Clone, Debug, Default)]
pub struct UniverseResolver {
    settings: ResolverSettings,
}

impl UniverseResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve a catalog into FUTURES, then OPTIONS, then EQUITY tokens.
    ///
    /// Fails when either derivatives cohort is missing. Individual rows with a
    /// blank identity or an unparsable expiry are dropped with a warning.
    pub fn resolve(
        &self,
        catalog: &[InstrumentRecord],
    ) -> Result<Vec<ResolvedToken>, ResolutionError> {
        let futures = self.resolve_futures(catalog)?;
        let options = self.resolve_options(catalog)?;
        let equities = self.resolve_equities(catalog, &futures);

        info!(
            "Resolved universe: {} futures, {} options, {} equities",
            futures.len(),
            options.len(),
            equities.len()
        );

        // One row per token across the whole universe
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::with_capacity(futures.len() + options.len() + equities.len());
        for token in futures.into_iter().chain(options).chain(equities) {
            if !seen.insert(token.token.clone()) {
                warn!(
                    "Token {} ({}) already resolved as another instrument, dropping it",
                    token.token, token.symbol
                );
                continue;
            }
            resolved.push(token);
        }
        Ok(resolved)
    }

    fn resolve_futures(
        &self,
        catalog: &[InstrumentRecord],
    ) -> Result<Vec<ResolvedToken>, ResolutionError> {
        let cohort = self.nearest_cohort(catalog, InstrumentType::FuturesStock)?;

        let mut seen = BTreeSet::new();
        let mut futures = Vec::with_capacity(cohort.len());
        for (record, expiry) in cohort {
            if !seen.insert(record.name.as_str()) {
                warn!(
                    "Duplicate current-expiry future for {} (token {}), keeping the first",
                    record.name, record.token
                );
                continue;
            }
            futures.push(to_resolved(record, Some(expiry), TokenType::Futures));
        }
        Ok(futures)
    }

    fn resolve_options(
        &self,
        catalog: &[InstrumentRecord],
    ) -> Result<Vec<ResolvedToken>, ResolutionError> {
        let mut cohort = self.nearest_cohort(catalog, InstrumentType::OptionsStock)?;

        let mut seen = BTreeSet::new();
        cohort.retain(|&(record, _)| {
            let first = seen.insert(record.token.as_str());
            if !first {
                warn!(
                    "Duplicate current-expiry option token {} ({}), keeping the first",
                    record.token, record.symbol
                );
            }
            first
        });

        let mut strikes_by_name: HashMap<&str, Vec<Decimal>> = HashMap::new();
        for &(record, _) in &cohort {
            if let Some(strike) = record.strike {
                strikes_by_name
                    .entry(record.name.as_str())
                    .or_default()
                    .push(strike);
            }
        }

        let distances: HashMap<&str, Option<Decimal>> = strikes_by_name
            .into_iter()
            .map(|(name, strikes)| (name, strike_distance(strikes)))
            .collect();

        for (name, distance) in &distances {
            if distance.is_none() {
                warn!(
                    "Fewer than two strikes listed for {}, strike distance left unresolved",
                    name
                );
            }
        }

        Ok(cohort
            .into_iter()
            .map(|(record, expiry)| {
                let mut token = to_resolved(record, Some(expiry), TokenType::Options);
                token.strike_distance = distances.get(record.name.as_str()).copied().flatten();
                token
            })
            .collect())
    }

    fn resolve_equities(
        &self,
        catalog: &[InstrumentRecord],
        futures: &[ResolvedToken],
    ) -> Vec<ResolvedToken> {
        let suffix = self.settings.equity_suffix.as_str();
        let futures_by_name: HashMap<&str, &str> = futures
            .iter()
            .map(|f| (f.name.as_str(), f.token.as_str()))
            .collect();

        let mut seen = BTreeSet::new();
        let mut equities = Vec::new();
        for record in catalog {
            if record.exchange_segment != self.settings.cash_segment {
                continue;
            }
            let Some(base) = record.symbol.strip_suffix(suffix) else {
                continue;
            };
            let Some(futures_token) = futures_by_name.get(base) else {
                continue;
            };
            if !record.has_identity() {
                warn!("Dropping equity row {} with a blank identity field", record.symbol);
                continue;
            }
            if !seen.insert(record.symbol.as_str()) {
                continue;
            }

            let mut token = to_resolved(record, None, TokenType::Equity);
            token.strike = None;
            token.futures_token = Some((*futures_token).to_string());
            debug!(
                "Mapped equity {} to futures token {}",
                record.symbol, futures_token
            );
            equities.push(token);
        }

        if equities.is_empty() {
            warn!(
                "No {} rows matched any futures underlying in {}",
                suffix, self.settings.cash_segment
            );
        }
        equities
    }

    /// Rows of one instrument type at the earliest parsable expiry.
    fn nearest_cohort<'a>(
        &self,
        catalog: &'a [InstrumentRecord],
        instrument_type: InstrumentType,
    ) -> Result<Vec<(&'a InstrumentRecord, NaiveDate)>, ResolutionError> {
        let candidates: Vec<&InstrumentRecord> = catalog
            .iter()
            .filter(|r| {
                r.instrument_type == instrument_type
                    && r.exchange_segment == self.settings.derivatives_segment
            })
            .collect();

        if candidates.is_empty() {
            return Err(match instrument_type {
                InstrumentType::OptionsStock => ResolutionError::NoOptionsRows,
                _ => ResolutionError::NoFuturesRows,
            });
        }

        let mut parsed = Vec::with_capacity(candidates.len());
        for record in candidates {
            if !record.has_identity() {
                warn!(
                    "Dropping {} row with a blank identity field (token '{}')",
                    instrument_type, record.token
                );
                continue;
            }
            match self.parse_expiry(record) {
                Some(expiry) => parsed.push((record, expiry)),
                None => warn!(
                    "Dropping {} with unparsable expiry {:?}",
                    record.symbol, record.expiry
                ),
            }
        }

        let Some(min_expiry) = parsed.iter().map(|(_, expiry)| *expiry).min() else {
            return Err(ResolutionError::NoParsableExpiry { instrument_type });
        };

        parsed.retain(|(_, expiry)| *expiry == min_expiry);
        info!(
            "Current {} cohort: {} rows expiring {}",
            instrument_type,
            parsed.len(),
            min_expiry
        );
        Ok(parsed)
    }

    fn parse_expiry(&self, record: &InstrumentRecord) -> Option<NaiveDate> {
        let raw = record.expiry.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, &self.settings.expiry_format).ok()
    }
}

fn to_resolved(
    record: &InstrumentRecord,
    expiry: Option<NaiveDate>,
    token_type: TokenType,
) -> ResolvedToken {
    ResolvedToken {
        token: record.token.clone(),
        symbol: record.symbol.clone(),
        name: record.name.clone(),
        exchange_segment: record.exchange_segment.clone(),
        instrument_type: record.instrument_type.clone(),
        expiry,
        strike: record.strike,
        lot_size: record.lot_size,
        tick_size: record.tick_size,
        token_type,
        futures_token: None,
        strike_distance: None,
    }
}
