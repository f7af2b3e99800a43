//! Core race and wagering logic

pub mod contestant;
pub mod engine;
pub mod ledger;
pub mod odds;
pub mod track;

// Re-export commonly used types
pub use contestant::{Contestant, ContestantId, ContestantStats, Gear, MovementPolicy};
pub use engine::{Outcome, RaceEngine, RaceSettings, RaceState};
pub use ledger::{Actor, ActorId, Stake, StakeOutcome, WageringLedger};
pub use odds::{update_aptitude_on_win, update_record_time, victory_odds, OddsBoard};
pub use track::{BonusItem, TrackEnvironment};
