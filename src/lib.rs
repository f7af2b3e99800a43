//! Derby - stochastic race simulation with a fixed-odds wagering ledger
//!
//! This library provides:
//! - A tick-based race engine over a configurable roster of contestants
//! - Victory odds derived from lifetime statistics, fixed at race start
//! - A wagering ledger that debits stakes on placement and settles once per race
//! - A season that carries the roster and ledger across repeated races
//! - A background driver that paces a race on a tokio task
//!
//! # Example
//!
//! ```no_run
//! use derby::config::ArenaConfig;
//! use derby::simulation::Season;
//!
//! let mut season = Season::new(ArenaConfig::default())?;
//! season.place_stake("alice", "Blaze", 25.0)?;
//!
//! let report = season.run_race()?;
//! println!("Winner: {:?}", report.outcome.winner_name);
//! # Ok::<(), derby::error::RaceError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod simulation;

// Re-export commonly used types
pub use config::{ArenaConfig, ConfigError};
pub use crate::core::{Contestant, ContestantId, MovementPolicy, Outcome, RaceEngine, WageringLedger};
pub use error::RaceError;
pub use models::{LedgerSnapshot, OutcomeEvent, RaceRecord, RaceSnapshot, StandingRow};
pub use simulation::{RaceReport, Season};
