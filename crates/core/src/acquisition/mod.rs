//! Quote acquisition.
//!
//! - [`market_hours`] - Trading session calendar
//! - [`planner`] - Splitting a token set into request-sized batches
//! - [`atm`] - Choosing option strikes around the futures price
//! - [`engine`] - The cancellable fetch loop
//!
//! ```text
//! WAITING_FOR_MARKET_OPEN → RUNNING ⇄ FETCHING → PERSISTING
//!                              ↓
//!                           SLEEPING → RUNNING … → STOPPED
//! ```

pub mod atm;
pub mod clock;
pub mod cycle;
pub mod engine;
pub mod market_hours;
pub mod planner;


pub use atm::{select_atm, AtmMode};
pub use clock::{AnchoredClock, Clock, SystemClock};
pub use cycle::{CycleState, EngineState, RunSummary};
pub use engine::AcquisitionEngine;
pub use market_hours::MarketHours;
pub use planner::plan;
