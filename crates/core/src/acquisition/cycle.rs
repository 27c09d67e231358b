//! Per-cycle bookkeeping.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};

/// Observable state of the acquisition engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    WaitingForMarketOpen,
    Running,
    Fetching,
    Persisting,
    Sleeping,
    Stopped,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForMarketOpen => "WAITING_FOR_MARKET_OPEN",
            Self::Running => "RUNNING",
            Self::Fetching => "FETCHING",
            Self::Persisting => "PERSISTING",
            Self::Sleeping => "SLEEPING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one cycle. Discarded once the cycle has been summarised.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleState {
    pub cycle_number: u64,
    pub started_at: DateTime<Utc>,
    /// False when the cycle fell outside market hours and fetched nothing.
    pub market_open: bool,
    pub batches: usize,
    pub fetched_count: usize,
    pub unfetched_count: usize,
    pub persisted_count: usize,
    pub errors: Vec<String>,
}

impl CycleState {
    pub fn new(cycle_number: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_number,
            started_at,
            market_open: true,
            batches: 0,
            fetched_count: 0,
            unfetched_count: 0,
            persisted_count: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn log_summary(&self, elapsed: Duration) {
        if !self.market_open {
            info!(
                "Cycle {}: market closed, fetch skipped",
                self.cycle_number
            );
            return;
        }
        info!(
            "Cycle {}: {} batches, {} fetched, {} unfetched, {} persisted in {:.2}s",
            self.cycle_number,
            self.batches,
            self.fetched_count,
            self.unfetched_count,
            self.persisted_count,
            elapsed.as_secs_f64()
        );
        if !self.errors.is_empty() {
            warn!(
                "Cycle {}: {} errors: {}",
                self.cycle_number,
                self.errors.len(),
                self.errors.join("; ")
            );
        }
    }
}

/// Totals returned by [`AcquisitionEngine::run`](super::AcquisitionEngine::run).
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub fetched: usize,
    pub unfetched: usize,
    pub persisted: usize,
    pub errors: usize,
    pub final_state: EngineState,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            cycles: 0,
            fetched: 0,
            unfetched: 0,
            persisted: 0,
            errors: 0,
            final_state: EngineState::WaitingForMarketOpen,
        }
    }
}

impl RunSummary {
    pub fn record(&mut self, cycle: &CycleState) {
        self.cycles += 1;
        self.fetched += cycle.fetched_count;
        self.unfetched += cycle.unfetched_count;
        self.persisted += cycle.persisted_count;
        self.errors += cycle.errors.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_summary_accumulates_cycles() {
        let started = Utc.with_ymd_and_hms(2025, 1, 6, 4, 0, 0).unwrap();
        let mut first = CycleState::new(1, started);
        first.fetched_count = 40;
        first.unfetched_count = 2;
        first.persisted_count = 38;
        first.record_error("batch 2: Timeout: SMARTAPI");

        let mut second = CycleState::new(2, started);
        second.fetched_count = 10;

        let mut summary = RunSummary::default();
        summary.record(&first);
        summary.record(&second);

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.fetched, 50);
        assert_eq!(summary.unfetched, 2);
        assert_eq!(summary.persisted, 38);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(EngineState::WaitingForMarketOpen.to_string(), "WAITING_FOR_MARKET_OPEN");
        assert_eq!(EngineState::Stopped.as_str(), "STOPPED");
    }
}
