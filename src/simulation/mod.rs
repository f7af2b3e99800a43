//! Race simulation
//!
//! Season orchestration, the background tick driver and wagering metrics.

pub mod driver;
pub mod metrics;
pub mod season;

pub use driver::{DriveReport, RaceDriver, RaceHandle};
pub use metrics::{analyze_by_contestant, calculate_metrics, ContestantBreakdown, StakeMetrics};
pub use season::{RaceReport, Season};
