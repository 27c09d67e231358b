//! Property-based tests for universe resolution, batch planning, strike
//! spacing and ATM selection.
//!
//! These tests verify that universal properties hold across all valid inputs,
//! using the `proptest` crate for random test case generation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

use marketfeed_core::acquisition::{plan, select_atm, AtmMode};
use marketfeed_core::instruments::{strike_distance, ResolvedToken, TokenType, UniverseResolver};
use marketfeed_core::settings::StrikeDistanceDefaults;
use marketfeed_market_data::{ExchangeSegment, ExchangeTokens, InstrumentRecord, InstrumentType};

const NAMES: [&str; 4] = ["FOO", "BAR", "BAZ", "QUX"];

/// Catalog expiries; the last two never parse.
const EXPIRIES: [&str; 6] = [
    "24APR2025",
    "30JAN2025",
    "27MAR2025",
    "27FEB2025",
    "2025-01-30",
    "",
];

// =============================================================================
// Generators
// =============================================================================

/// Generates tokens spread over a few exchanges, in arbitrary order.
fn arb_exchange_tokens() -> impl Strategy<Value = ExchangeTokens> {
    proptest::collection::vec((0usize..3, 0u32..400), 0..300).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(exchange, token)| (["NSE", "NFO", "BSE"][exchange], token.to_string()))
            .collect()
    })
}

/// Generates an option chain for one underlying: (strikes, step).
fn arb_chain() -> impl Strategy<Value = (Vec<i64>, i64)> {
    (1i64..200, 2usize..30, 1i64..100).prop_flat_map(|(first, count, step)| {
        let strikes: Vec<i64> = (0..count as i64).map(|i| first * 10 + i * step).collect();
        (Just(strikes).prop_shuffle(), Just(step))
    })
}

/// Generates futures rows as (name, expiry) indexes into `NAMES` and `EXPIRIES`.
fn arb_futures_rows() -> impl Strategy<Value = Vec<(usize, usize)>> {
    proptest::collection::vec((0..NAMES.len(), 0..EXPIRIES.len()), 1..40)
}

fn catalog_row(
    token: String,
    name: &str,
    kind: InstrumentType,
    expiry: &str,
    strike: Option<Decimal>,
) -> InstrumentRecord {
    InstrumentRecord {
        symbol: format!("{}{}{}", name, expiry, token),
        token,
        name: name.to_string(),
        exchange_segment: ExchangeSegment::Nfo,
        instrument_type: kind,
        expiry: Some(expiry.to_string()),
        strike,
        lot_size: 1,
        tick_size: Decimal::new(5, 2),
    }
}

fn parse_catalog_expiry(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d%b%Y").ok()
}

fn option_row(name: &str, strike: i64, side: &str, distance: i64) -> ResolvedToken {
    ResolvedToken {
        token: format!("{}{}{}", name, strike, side),
        symbol: format!("{}30JAN25{}{}", name, strike, side),
        name: name.to_string(),
        exchange_segment: ExchangeSegment::Nfo,
        instrument_type: InstrumentType::OptionsStock,
        expiry: None,
        strike: Some(Decimal::from(strike)),
        lot_size: 1,
        tick_size: Decimal::new(5, 2),
        token_type: TokenType::Options,
        futures_token: None,
        strike_distance: Some(Decimal::from(distance)),
    }
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Universe resolution
    // =========================================================================

    /// Every resolved future carries the earliest parsable expiry, once per name.
    #[test]
    fn prop_resolve_futures_are_min_expiry(rows in arb_futures_rows()) {
        let mut catalog: Vec<InstrumentRecord> = rows
            .iter()
            .enumerate()
            .map(|(i, &(name, expiry))| {
                catalog_row(
                    format!("F{}", i),
                    NAMES[name],
                    InstrumentType::FuturesStock,
                    EXPIRIES[expiry],
                    None,
                )
            })
            .collect();
        catalog.push(catalog_row(
            "O1".to_string(),
            "FOO",
            InstrumentType::OptionsStock,
            "30JAN2025",
            Some(Decimal::from(1000)),
        ));

        let min_expiry = rows
            .iter()
            .filter_map(|&(_, expiry)| parse_catalog_expiry(EXPIRIES[expiry]))
            .min();
        let resolved = UniverseResolver::default().resolve(&catalog);

        let Some(min_expiry) = min_expiry else {
            prop_assert!(resolved.is_err());
            return Ok(());
        };
        let resolved = resolved.unwrap();
        let futures: Vec<&ResolvedToken> = resolved
            .iter()
            .filter(|t| t.token_type == TokenType::Futures)
            .collect();

        for future in &futures {
            prop_assert_eq!(future.expiry, Some(min_expiry));
        }

        let expected_names: BTreeSet<&str> = rows
            .iter()
            .filter(|&&(_, expiry)| parse_catalog_expiry(EXPIRIES[expiry]) == Some(min_expiry))
            .map(|&(name, _)| NAMES[name])
            .collect();
        let names: Vec<&str> = futures.iter().map(|f| f.name.as_str()).collect();
        let distinct: BTreeSet<&str> = names.iter().copied().collect();
        prop_assert_eq!(names.len(), distinct.len());
        prop_assert_eq!(distinct, expected_names);
    }

    // =========================================================================
    // Batch planning and ATM selection
    // =========================================================================

    /// Every batch is non-empty and within the limit, and concatenating the
    /// batches gives back the input tokens in the same order.
    #[test]
    fn prop_plan_is_bounded_and_order_preserving(
        tokens in arb_exchange_tokens(),
        max in 1usize..60,
    ) {
        let batches = plan(&tokens, max);

        for batch in &batches {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.total() <= max);
        }

        let planned: Vec<(ExchangeSegment, String)> = batches
            .iter()
            .flat_map(|b| b.pairs().map(|(e, t)| (e.clone(), t.clone())).collect::<Vec<_>>())
            .collect();
        let expected: Vec<(ExchangeSegment, String)> = tokens
            .pairs()
            .map(|(e, t)| (e.clone(), t.clone()))
            .collect();
        prop_assert_eq!(planned, expected);
    }

    /// A single exchange packs into the fewest possible batches.
    #[test]
    fn prop_plan_single_exchange_is_minimal(count in 0usize..500, max in 1usize..60) {
        let tokens: ExchangeTokens = (0..count).map(|i| ("NFO", i.to_string())).collect();
        let batches = plan(&tokens, max);
        prop_assert_eq!(batches.len(), count.div_ceil(max));
    }

    /// Evenly spaced strikes, in any order, report their spacing.
    #[test]
    fn prop_strike_distance_recovers_step((strikes, step) in arb_chain()) {
        let distance = strike_distance(strikes.iter().map(|k| Decimal::from(*k)));
        prop_assert_eq!(distance, Some(Decimal::from(step)));
    }

    /// Exact mode never keeps more than one call and one put per underlying.
    #[test]
    fn prop_exact_atm_keeps_at_most_two(
        (strikes, step) in arb_chain(),
        price in 0i64..5000,
    ) {
        let options: Vec<ResolvedToken> = strikes
            .iter()
            .flat_map(|k| {
                vec![
                    option_row("FOO", *k, "CE", step),
                    option_row("FOO", *k, "PE", step),
                ]
            })
            .collect();
        let prices: HashMap<String, Decimal> =
            [("FOO".to_string(), Decimal::from(price))].into_iter().collect();

        let defaults = StrikeDistanceDefaults::default();
        let selected = select_atm(&options, &prices, AtmMode::Exact, &defaults);

        prop_assert_eq!(selected.len(), 2);
        prop_assert_eq!(selected[0].strike, selected[1].strike);
    }

    /// Buffered selection is a subset of the input, in input order, and every
    /// kept strike lies within the buffer.
    #[test]
    fn prop_buffered_atm_within_buffer(
        (strikes, step) in arb_chain(),
        price in 0i64..5000,
        buffer in 0u32..5,
    ) {
        let options: Vec<ResolvedToken> = strikes
            .iter()
            .map(|k| option_row("FOO", *k, "CE", step))
            .collect();
        let prices: HashMap<String, Decimal> =
            [("FOO".to_string(), Decimal::from(price))].into_iter().collect();

        let selected = select_atm(
            &options,
            &prices,
            AtmMode::Buffered(buffer),
            &StrikeDistanceDefaults::default(),
        );

        let mut cursor = options.iter();
        for row in &selected {
            prop_assert!(cursor.any(|o| o.token == row.token));
            let strike = row.strike.unwrap_or_default();
            let strikes_away = (Decimal::from(price) - strike).abs() / Decimal::from(step);
            prop_assert!(strikes_away <= Decimal::from(buffer));
        }
    }
}
