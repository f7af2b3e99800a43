//! Wagering ledger
//!
//! Each actor holds funds, at most one pending stake and a full stake history
//! grouped by contestant. Funds are debited when a stake is placed; a winning
//! stake is paid `amount * odds + amount` at settlement.
//!
//! Placing a new stake before the race settles replaces the pending one. The
//! replaced stake stays in the history, unresolved, and its amount is lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::contestant::ContestantId;
use super::engine::Outcome;
use super::odds::OddsBoard;
use crate::error::{validate_stake_amount, RaceError};
use crate::models::{ActorSummary, LedgerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeOutcome {
    Win,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stake {
    pub actor: ActorId,
    pub contestant: ContestantId,
    pub amount: f64,
    /// Ledger-wide placement order
    pub sequence: u64,
    pub placed_at: DateTime<Utc>,
    /// `None` while pending, and forever for a superseded stake
    pub outcome: Option<StakeOutcome>,
    /// Winnings on top of the returned amount
    pub earnings: f64,
}

impl Stake {
    pub fn is_winning(&self) -> bool {
        self.outcome == Some(StakeOutcome::Win)
    }
}

/// Position of the pending stake inside an actor's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingStake {
    contestant: ContestantId,
    index: usize,
}

#[derive(Debug, Clone)]
pub struct Actor {
    id: ActorId,
    name: String,
    funds: f64,
    triumphs: u32,
    total_earnings: f64,
    pending: Option<PendingStake>,
    history: BTreeMap<ContestantId, Vec<Stake>>,
}

impl Actor {
    fn new(id: ActorId, name: String, funds: f64) -> Self {
        Self {
            id,
            name,
            funds,
            triumphs: 0,
            total_earnings: 0.0,
            pending: None,
            history: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    pub fn triumphs(&self) -> u32 {
        self.triumphs
    }

    pub fn total_earnings(&self) -> f64 {
        self.total_earnings
    }

    pub fn history(&self) -> &BTreeMap<ContestantId, Vec<Stake>> {
        &self.history
    }

    /// All stakes in placement order
    pub fn stakes(&self) -> Vec<&Stake> {
        let mut stakes: Vec<&Stake> = self.history.values().flatten().collect();
        stakes.sort_by_key(|s| s.sequence);
        stakes
    }

    pub fn pending_stake(&self) -> Option<&Stake> {
        let pending = self.pending?;
        self.history.get(&pending.contestant)?.get(pending.index)
    }

    pub fn total_stakes(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }

    /// Share of all placed stakes that won, in percent
    pub fn win_percentage(&self) -> f64 {
        let total = self.total_stakes();
        if total == 0 {
            0.0
        } else {
            self.triumphs as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone)]
pub struct WageringLedger {
    actors: Vec<Actor>,
    /// Size of the roster stakes may target
    contestants: usize,
    next_sequence: u64,
}

impl WageringLedger {
    /// Ledger for a roster of `contestants`, with ids `0..contestants`
    pub fn new(contestants: usize) -> Self {
        Self {
            actors: Vec::new(),
            contestants,
            next_sequence: 0,
        }
    }

    pub fn contestants(&self) -> usize {
        self.contestants
    }

    /// Register an actor with its starting funds
    pub fn open_account(&mut self, name: impl Into<String>, funds: f64) -> Result<ActorId, RaceError> {
        let name = name.into();
        if self.actors.iter().any(|a| a.name == name) {
            return Err(RaceError::Configuration(format!("Duplicate actor name: {}", name)));
        }
        if !(funds >= 0.0) || !funds.is_finite() {
            return Err(RaceError::Configuration(format!(
                "Initial funds for {} must be a non-negative number, got {}",
                name, funds
            )));
        }

        let id = ActorId(self.actors.len());
        self.actors.push(Actor::new(id, name, funds));
        Ok(id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id.0)
    }

    pub fn actor_by_name(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.name == name)
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Stake `amount` on `contestant`, debiting the actor immediately
    ///
    /// Fails without touching the ledger when the contestant is not on the
    /// roster, or the amount is not positive or exceeds the actor's funds.
    pub fn place_stake(
        &mut self,
        actor: ActorId,
        contestant: ContestantId,
        amount: f64,
    ) -> Result<&Stake, RaceError> {
        if contestant.0 >= self.contestants {
            return Err(RaceError::UnknownContestant(contestant.to_string()));
        }
        let sequence = self.next_sequence;
        let entry = self
            .actors
            .get_mut(actor.0)
            .ok_or_else(|| RaceError::UnknownActor(format!("{:?}", actor)))?;

        if let Err(rejection) = validate_stake_amount(amount, entry.funds) {
            warn!(actor = %entry.name, amount, reason = %rejection, "Stake rejected");
            return Err(rejection.into());
        }

        if let Some(previous) = entry.pending.take() {
            debug!(
                actor = %entry.name,
                contestant = %previous.contestant,
                "Pending stake superseded"
            );
        }

        entry.funds -= amount;
        let stakes = entry.history.entry(contestant).or_default();
        stakes.push(Stake {
            actor,
            contestant,
            amount,
            sequence,
            placed_at: Utc::now(),
            outcome: None,
            earnings: 0.0,
        });
        let index = stakes.len() - 1;
        entry.pending = Some(PendingStake { contestant, index });
        self.next_sequence += 1;

        info!(actor = %entry.name, contestant = %contestant, amount, funds = entry.funds, "Stake placed");
        Ok(&stakes[index])
    }

    /// Resolve every pending stake against `outcome`, paying winners at the
    /// odds on `board`
    pub fn settle(&mut self, outcome: Outcome, board: &OddsBoard) -> LedgerSnapshot {
        for actor in &mut self.actors {
            let Some(pending) = actor.pending.take() else {
                continue;
            };
            let Some(stake) = actor
                .history
                .get_mut(&pending.contestant)
                .and_then(|stakes| stakes.get_mut(pending.index))
            else {
                continue;
            };

            match outcome {
                Outcome::Winner(winner) if winner == stake.contestant => {
                    let odds = board.get(winner).unwrap_or(1.0);
                    let earnings = stake.amount * odds;
                    actor.funds += earnings + stake.amount;
                    actor.triumphs += 1;
                    actor.total_earnings += earnings;
                    stake.outcome = Some(StakeOutcome::Win);
                    stake.earnings = earnings;
                    info!(actor = %actor.name, earnings, funds = actor.funds, "Stake won");
                }
                _ => {
                    stake.outcome = Some(StakeOutcome::Loss);
                    debug!(actor = %actor.name, amount = stake.amount, "Stake lost");
                }
            }
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            actors: self
                .actors
                .iter()
                .map(|a| ActorSummary {
                    name: a.name.clone(),
                    funds: a.funds,
                    triumphs: a.triumphs,
                    win_percentage: a.win_percentage(),
                    total_earnings: a.total_earnings,
                    pending_on: a.pending_stake().map(|s| s.contestant),
                })
                .collect(),
        }
    }
}
