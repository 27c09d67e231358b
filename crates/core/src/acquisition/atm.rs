//! At-the-money option selection.

use std::collections::{HashMap, HashSet};

use log::warn;
use rust_decimal::Decimal;

use crate::instruments::{OptionSide, ResolvedToken};
use crate::settings::StrikeDistanceDefaults;

/// How options are narrowed around the futures price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtmMode {
    /// Nearest call and nearest put per underlying.
    Exact,
    /// Every strike within `n` strike distances of the futures price.
    Buffered(u32),
}

impl AtmMode {
    pub fn from_settings(exact_atm_only: bool, strike_buffer: u32) -> Self {
        if exact_atm_only {
            Self::Exact
        } else {
            Self::Buffered(strike_buffer)
        }
    }
}

/// Pick the options worth quoting given live futures prices per underlying.
///
/// Output is a subset of `options` in the same order. Underlyings without a
/// price in `futures_prices` and rows without a strike are never selected.
pub fn select_atm(
    options: &[ResolvedToken],
    futures_prices: &HashMap<String, Decimal>,
    mode: AtmMode,
    fallback: &StrikeDistanceDefaults,
) -> Vec<ResolvedToken> {
    match mode {
        AtmMode::Exact => select_exact(options, futures_prices),
        AtmMode::Buffered(buffer) => select_buffered(options, futures_prices, buffer, fallback),
    }
}

fn select_exact(
    options: &[ResolvedToken],
    futures_prices: &HashMap<String, Decimal>,
) -> Vec<ResolvedToken> {
    // (underlying, side) -> (index of best row, its distance to the price)
    let mut best: HashMap<(&str, OptionSide), (usize, Decimal)> = HashMap::new();

    for (index, option) in options.iter().enumerate() {
        let Some(price) = futures_prices.get(&option.name) else {
            continue;
        };
        let (Some(strike), Some(side)) = (option.strike, option.option_side()) else {
            continue;
        };
        let distance = (strike - *price).abs();
        best.entry((option.name.as_str(), side))
            .and_modify(|current| {
                if distance < current.1 {
                    *current = (index, distance);
                }
            })
            .or_insert((index, distance));
    }

    let chosen: HashSet<usize> = best.values().map(|(index, _)| *index).collect();
    options
        .iter()
        .enumerate()
        .filter(|(index, _)| chosen.contains(index))
        .map(|(_, option)| option.clone())
        .collect()
}

fn select_buffered(
    options: &[ResolvedToken],
    futures_prices: &HashMap<String, Decimal>,
    buffer: u32,
    fallback: &StrikeDistanceDefaults,
) -> Vec<ResolvedToken> {
    let buffer = Decimal::from(buffer);
    let mut warned: HashSet<&str> = HashSet::new();
    let mut selected = Vec::new();

    for option in options {
        let (Some(price), Some(strike)) = (futures_prices.get(&option.name), option.strike) else {
            continue;
        };

        let distance = match option.strike_distance {
            Some(d) if d > Decimal::ZERO => d,
            _ => {
                let d = fallback.for_underlying(&option.name);
                if warned.insert(option.name.as_str()) {
                    warn!(
                        "No strike distance for {}, using configured fallback {}",
                        option.name, d
                    );
                }
                d
            }
        };
        if distance <= Decimal::ZERO {
            continue;
        }

        if (*price - strike).abs() / distance <= buffer {
            selected.push(option.clone());
        }
    }
    selected
}
