use serde::{Deserialize, Serialize};

use crate::core::contestant::ContestantId;
use crate::core::engine::RaceState;
use crate::core::track::BonusItem;

/// Position of one contestant after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantSnapshot {
    pub id: ContestantId,
    pub name: String,
    pub symbol: char,
    pub progress: f64,
    pub fallen: bool,
    pub finished: bool,
}

/// Immutable view of a race, produced after every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub tick: u32,
    pub distance: u32,
    pub state: RaceState,
    pub contestants: Vec<ContestantSnapshot>,
    pub bonus_items: Vec<BonusItem>,
}

/// Delivered once per completed race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_name: Option<String>,
}

/// Per-actor ledger figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSummary {
    pub name: String,
    pub funds: f64,
    pub triumphs: u32,
    pub win_percentage: f64,
    pub total_earnings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_on: Option<ContestantId>,
}

/// Ledger state after settlement, in actor order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub actors: Vec<ActorSummary>,
}

impl LedgerSnapshot {
    pub fn get(&self, name: &str) -> Option<&ActorSummary> {
        self.actors.iter().find(|a| a.name == name)
    }
}

/// Contestant standings row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    pub name: String,
    pub symbol: char,
    pub skill: f64,
    pub triumphs: u32,
    pub races_run: u32,
    pub aptitude: f64,
    /// `None` until the contestant has won a race
    pub best_time: Option<f64>,
    pub odds: f64,
}

/// Result of one completed race in a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub race_number: u32,
    pub seed: u64,
    pub ticks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}
