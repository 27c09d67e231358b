//! The acquisition loop.
//!
//! One engine runs one sequential worker. Every suspension point (waiting for
//! the open, pacing between batches, sleeping between cycles) is raced
//! against the cancellation token, so a shutdown is observed within one
//! wait increment. A batch that is already in flight is allowed to finish.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::atm::{select_atm, AtmMode};
use super::clock::Clock;
use super::cycle::{CycleState, EngineState, RunSummary};
use super::planner::plan;
use crate::instruments::{ResolvedToken, TokenStore, TokenType};
use crate::quotes::QuoteStore;
use crate::settings::AcquisitionSettings;
use marketfeed_market_data::{
    ExchangeTokens, ProviderId, QuoteProvider, QuoteSnapshot, RateLimit, RateLimiter,
    RetryClass, SymbolToken,
};

/// Outcome of one fetch pass.
struct Pass {
    fetched: Vec<QuoteSnapshot>,
    /// The provider rejected the session; nothing more can be fetched this cycle.
    session_lost: bool,
}

/// Sleep for `duration` unless cancelled first. Returns false on cancellation.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

pub struct AcquisitionEngine {
    provider: Arc<dyn QuoteProvider>,
    tokens: Arc<dyn TokenStore>,
    quotes: Arc<dyn QuoteStore>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    settings: AcquisitionSettings,
    state: watch::Sender<EngineState>,
}

impl AcquisitionEngine {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        tokens: Arc<dyn TokenStore>,
        quotes: Arc<dyn QuoteStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        settings: AcquisitionSettings,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::WaitingForMarketOpen);
        Self {
            provider,
            tokens,
            quotes,
            limiter,
            clock,
            settings,
            state,
        }
    }

    /// Receiver for state transitions.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    fn set_state(&self, next: EngineState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Acquisition state {} -> {}", previous, next);
        }
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(
            "Acquisition starting: every {:?}, mode {}, equity={} futures={} options={} atm_only={} exact_atm={} buffer={}",
            self.settings.refresh_interval,
            self.settings.quote_mode,
            self.settings.include_equity,
            self.settings.include_futures,
            self.settings.include_options,
            self.settings.atm_only,
            self.settings.exact_atm_only,
            self.settings.strike_buffer
        );

        if self.settings.wait_for_market_open && !self.wait_for_market_open(&cancel).await {
            return self.stop(summary);
        }
        self.set_state(EngineState::Running);

        let mut cycle_number = 0;
        while !cancel.is_cancelled() {
            cycle_number += 1;
            let started = Instant::now();

            let cycle = self.run_cycle(cycle_number, &cancel).await;
            cycle.log_summary(started.elapsed());
            summary.record(&cycle);

            if cancel.is_cancelled() {
                break;
            }

            let remaining = self
                .settings
                .refresh_interval
                .saturating_sub(started.elapsed());
            debug!("Sleeping {:?} until the next cycle", remaining);
            self.set_state(EngineState::Sleeping);
            if !sleep_or_cancel(&cancel, remaining).await {
                break;
            }
            self.set_state(EngineState::Running);
        }

        self.stop(summary)
    }

    fn stop(&self, mut summary: RunSummary) -> RunSummary {
        self.set_state(EngineState::Stopped);
        summary.final_state = EngineState::Stopped;
        info!(
            "Acquisition stopped after {} cycles: {} fetched, {} unfetched, {} persisted, {} errors",
            summary.cycles, summary.fetched, summary.unfetched, summary.persisted, summary.errors
        );
        summary
    }

    /// Block until today's session opens. Returns false if cancelled first.
    async fn wait_for_market_open(&self, cancel: &CancellationToken) -> bool {
        let hours = &self.settings.market_hours;
        let mut announced = false;

        while let Some(remaining) = hours.time_until_open(self.clock.now()) {
            if !announced {
                self.set_state(EngineState::WaitingForMarketOpen);
                info!(
                    "Market opens at {}, waiting {:.1} minutes",
                    hours.open,
                    remaining.as_secs_f64() / 60.0
                );
                announced = true;
            } else {
                debug!(
                    "Still waiting for market open: {:.0}s remaining",
                    remaining.as_secs_f64()
                );
            }

            if !sleep_or_cancel(cancel, remaining.min(self.settings.wait_increment)).await {
                info!("Cancelled while waiting for market open");
                return false;
            }
        }
        true
    }

    /// Run one fetch cycle.
    ///
    /// Token sets are read from the store on every call, so a universe refresh
    /// between cycles is picked up without restarting the engine.
    pub async fn run_cycle(&self, cycle_number: u64, cancel: &CancellationToken) -> CycleState {
        let mut cycle = CycleState::new(cycle_number, self.clock.now());

        if !self.settings.market_hours.is_open(cycle.started_at) {
            cycle.market_open = false;
            return cycle;
        }
        if !self.ensure_connected(&mut cycle).await {
            return cycle;
        }

        let settings = &self.settings;
        let mut requested: HashSet<SymbolToken> = HashSet::new();

        // Equity and futures first; the futures prices drive option selection
        let equity = if settings.include_equity {
            self.load(TokenType::Equity, settings.equity_limit, &mut cycle)
        } else {
            Vec::new()
        };
        let futures = if settings.fetches_futures() {
            self.load(TokenType::Futures, settings.futures_limit, &mut cycle)
        } else {
            Vec::new()
        };

        let reference_only: HashSet<SymbolToken> = if settings.include_futures {
            HashSet::new()
        } else {
            futures.iter().map(|f| f.token.clone()).collect()
        };

        let first_pass = collect_new(equity.iter().chain(futures.iter()), &mut requested);
        let first = self
            .fetch_and_persist(&first_pass, &reference_only, &mut cycle, cancel)
            .await;

        if first.session_lost {
            warn!("Session lost in cycle {}, options deferred to the next cycle", cycle_number);
            return cycle;
        }
        if !settings.include_options || cancel.is_cancelled() {
            return cycle;
        }

        let universe = self.load(TokenType::Options, None, &mut cycle);
        let mut selected = if settings.atm_only {
            let prices = futures_prices(&futures, &first.fetched);
            debug!("Futures prices available for {} underlyings", prices.len());
            select_atm(
                &universe,
                &prices,
                AtmMode::from_settings(settings.exact_atm_only, settings.strike_buffer),
                &settings.strike_distance,
            )
        } else {
            universe
        };
        if let Some(limit) = settings.options_limit {
            selected.truncate(limit);
        }
        info!("Selected {} options for cycle {}", selected.len(), cycle_number);

        let second_pass = collect_new(selected.iter(), &mut requested);
        let second = self
            .fetch_and_persist(&second_pass, &HashSet::new(), &mut cycle, cancel)
            .await;
        if second.session_lost {
            warn!("Session lost in cycle {}, reconnecting next cycle", cycle_number);
        }

        cycle
    }

    async fn ensure_connected(&self, cycle: &mut CycleState) -> bool {
        if self.provider.is_connected() {
            return true;
        }
        match self.provider.connect().await {
            Ok(()) => {
                info!("Connected to {}", self.provider.id());
                true
            }
            Err(e) => {
                warn!("Could not connect to {}: {}", self.provider.id(), e);
                cycle.record_error(format!("connect: {}", e));
                false
            }
        }
    }

    fn load(
        &self,
        token_type: TokenType,
        limit: Option<usize>,
        cycle: &mut CycleState,
    ) -> Vec<ResolvedToken> {
        match self.tokens.tokens_by_type(token_type, limit) {
            Ok(tokens) => tokens,
            Err(e) => {
                error!("Failed to read {} tokens: {}", token_type, e);
                cycle.record_error(format!("load {}: {}", token_type, e));
                Vec::new()
            }
        }
    }

    fn pacing(&self) -> RateLimit {
        let mut limit = self.provider.rate_limit();
        limit.min_delay = limit.min_delay.max(self.settings.inter_batch_delay);
        limit
    }

    /// Fetch `tokens` in planned batches, persisting each batch as it arrives.
    ///
    /// Tokens in `skip_persist` are fetched but not stored. A rejected session
    /// abandons the remaining batches; the next cycle reconnects first.
    async fn fetch_and_persist(
        &self,
        tokens: &ExchangeTokens,
        skip_persist: &HashSet<SymbolToken>,
        cycle: &mut CycleState,
        cancel: &CancellationToken,
    ) -> Pass {
        let max = self
            .settings
            .max_tokens_per_request
            .min(self.provider.max_tokens_per_request());
        let batches = plan(tokens, max);
        let provider_id: ProviderId = Cow::Borrowed(self.provider.id());
        let pacing = self.pacing();
        let mut pass = Pass {
            fetched: Vec::new(),
            session_lost: false,
        };

        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    "Cancellation requested, skipping {} remaining batches",
                    batches.len() - index
                );
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cancelled while pacing before batch {}/{}", index + 1, batches.len());
                    break;
                }
                _ = self.limiter.acquire(&provider_id, &pacing) => {}
            }

            self.set_state(EngineState::Fetching);
            cycle.batches += 1;
            info!(
                "Fetching batch {}/{} ({} tokens)",
                index + 1,
                batches.len(),
                batch.total()
            );

            let result = match self
                .provider
                .fetch_quotes(self.settings.quote_mode, batch)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    cycle.record_error(format!("batch {}: {}", index + 1, e));
                    self.set_state(EngineState::Running);
                    match e.retry_class() {
                        RetryClass::Reconnect => {
                            warn!(
                                "Batch {}/{} rejected the session, skipping {} remaining batches: {}",
                                index + 1,
                                batches.len(),
                                batches.len() - index - 1,
                                e
                            );
                            pass.session_lost = true;
                            break;
                        }
                        RetryClass::NextCycle => {
                            warn!("Batch {}/{} failed: {}", index + 1, batches.len(), e);
                        }
                        RetryClass::Never => {
                            error!("Batch {}/{} was refused: {}", index + 1, batches.len(), e);
                        }
                    }
                    continue;
                }
            };

            cycle.fetched_count += result.fetched.len();
            cycle.unfetched_count += result.unfetched.len();
            if !result.unfetched.is_empty() {
                debug!(
                    "Batch {}/{}: {} tokens unfetched, retrying next cycle",
                    index + 1,
                    batches.len(),
                    result.unfetched.len()
                );
            }

            self.set_state(EngineState::Persisting);
            let to_store: Vec<QuoteSnapshot> = result
                .fetched
                .iter()
                .filter(|s| !skip_persist.contains(&s.symbol_token))
                .cloned()
                .collect();
            if !to_store.is_empty() {
                match self.quotes.upsert_snapshots(self.clock.now(), &to_store).await {
                    Ok(written) => cycle.persisted_count += written,
                    Err(e) => {
                        error!(
                            "Failed to persist {} quotes from batch {}/{}, data discarded: {}",
                            to_store.len(),
                            index + 1,
                            batches.len(),
                            e
                        );
                        cycle.record_error(format!("persist batch {}: {}", index + 1, e));
                    }
                }
            }

            pass.fetched.extend(result.fetched);
            self.set_state(EngineState::Running);
        }

        pass
    }
}

/// Group tokens by exchange, skipping any already requested this cycle.
fn collect_new<'a, I>(tokens: I, requested: &mut HashSet<SymbolToken>) -> ExchangeTokens
where
    I: IntoIterator<Item = &'a ResolvedToken>,
{
    let mut grouped = ExchangeTokens::new();
    for token in tokens {
        if requested.insert(token.token.clone()) {
            grouped.push(token.exchange_segment.clone(), token.token.clone());
        }
    }
    grouped
}

/// Last traded futures price per underlying name.
fn futures_prices(
    futures: &[ResolvedToken],
    fetched: &[QuoteSnapshot],
) -> HashMap<String, Decimal> {
    let name_by_token: HashMap<&str, &str> = futures
        .iter()
        .map(|f| (f.token.as_str(), f.name.as_str()))
        .collect();

    fetched
        .iter()
        .filter_map(|s| {
            name_by_token
                .get(s.symbol_token.as_str())
                .map(|name| (name.to_string(), s.ltp))
        })
        .collect()
}
