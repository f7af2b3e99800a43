//! Season
//!
//! Owns the persistent roster and the wagering ledger across races. Each race
//! runs on a copy of the roster. Only a completed race writes statistics,
//! funds and a record back, so a cancelled race leaves no trace.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::driver::{DriveReport, RaceDriver, RaceHandle};
use super::metrics::{analyze_by_contestant, calculate_metrics, closed_stakes, ContestantBreakdown, StakeMetrics};
use crate::config::ArenaConfig;
use crate::core::odds::WIN_APTITUDE_DELTA;
use crate::core::{
    update_aptitude_on_win, update_record_time, victory_odds, Contestant, ContestantId, OddsBoard,
    Outcome, RaceEngine, Stake, WageringLedger,
};
use crate::error::RaceError;
use crate::models::{LedgerSnapshot, OutcomeEvent, RaceRecord, RaceSnapshot, StandingRow};

/// Everything a completed race produced
#[derive(Debug, Clone, PartialEq)]
pub struct RaceReport {
    pub record: RaceRecord,
    pub outcome: OutcomeEvent,
    pub ledger: LedgerSnapshot,
}

struct RunningRace {
    handle: RaceHandle,
    seed: u64,
}

pub struct Season {
    config: ArenaConfig,
    roster: Vec<Contestant>,
    ledger: WageringLedger,
    /// Hands out one seed per race
    seeds: ChaCha8Rng,
    records: Vec<RaceRecord>,
    running: Option<RunningRace>,
}

impl Season {
    pub fn new(config: ArenaConfig) -> Result<Self, RaceError> {
        config.validate()?;

        let mut ledger = WageringLedger::new(config.contestants.len());
        for actor in &config.actors {
            ledger.open_account(actor.name.clone(), actor.funds)?;
        }

        Ok(Self {
            roster: config.build_roster(),
            seeds: ChaCha8Rng::seed_from_u64(config.seed),
            ledger,
            records: Vec::new(),
            running: None,
            config,
        })
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Roster as of the last completed race
    pub fn roster(&self) -> &[Contestant] {
        &self.roster
    }

    pub fn ledger(&self) -> &WageringLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[RaceRecord] {
        &self.records
    }

    pub fn is_racing(&self) -> bool {
        self.running.is_some()
    }

    /// Look up a contestant by name, ignoring case
    pub fn contestant_id(&self, name: &str) -> Result<ContestantId, RaceError> {
        self.roster
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .map(|c| c.id())
            .ok_or_else(|| RaceError::UnknownContestant(name.to_string()))
    }

    /// Stake on the next race to settle
    pub fn place_stake(&mut self, actor: &str, contestant: &str, amount: f64) -> Result<&Stake, RaceError> {
        let contestant = self.contestant_id(contestant)?;
        let actor = self
            .ledger
            .actor_by_name(actor)
            .map(|a| a.id())
            .ok_or_else(|| RaceError::UnknownActor(actor.to_string()))?;
        self.ledger.place_stake(actor, contestant, amount)
    }

    /// Odds the next race will start with
    pub fn odds_board(&self) -> OddsBoard {
        OddsBoard::from_roster(&self.roster)
    }

    /// Contestants ordered by triumphs, then by odds
    pub fn standings(&self) -> Vec<StandingRow> {
        let mut rows: Vec<StandingRow> = self
            .roster
            .iter()
            .map(|c| StandingRow {
                name: c.name().to_string(),
                symbol: c.symbol(),
                skill: c.skill(),
                triumphs: c.stats.triumphs,
                races_run: c.stats.races_run,
                aptitude: c.stats.aptitude,
                best_time: c.stats.best_time.is_finite().then_some(c.stats.best_time),
                odds: victory_odds(&c.stats),
            })
            .collect();

        rows.sort_by(|a, b| {
            b.triumphs
                .cmp(&a.triumphs)
                .then_with(|| b.odds.total_cmp(&a.odds))
        });
        rows
    }

    pub fn actor_metrics(&self, actor: &str) -> Result<StakeMetrics, RaceError> {
        let actor = self
            .ledger
            .actor_by_name(actor)
            .ok_or_else(|| RaceError::UnknownActor(actor.to_string()))?;
        Ok(calculate_metrics(&closed_stakes(actor)))
    }

    pub fn actor_breakdown(&self, actor: &str) -> Result<Vec<ContestantBreakdown>, RaceError> {
        let actor = self
            .ledger
            .actor_by_name(actor)
            .ok_or_else(|| RaceError::UnknownActor(actor.to_string()))?;
        Ok(analyze_by_contestant(&closed_stakes(actor)))
    }

    fn next_engine(&mut self) -> Result<(RaceEngine, u64), RaceError> {
        let seed: u64 = self.seeds.gen();
        let engine = RaceEngine::configure(self.config.race_settings(seed), self.roster.clone())?;
        Ok((engine, seed))
    }

    /// Run a whole race on the calling thread
    pub fn run_race(&mut self) -> Result<RaceReport, RaceError> {
        if self.running.is_some() {
            return Err(RaceError::RaceInProgress);
        }

        let (mut engine, seed) = self.next_engine()?;
        let outcome = loop {
            engine.tick()?;
            if let Some(outcome) = engine.take_outcome() {
                break outcome;
            }
        };

        let ticks = engine.tick_count();
        let odds = engine.odds().clone();
        Ok(self.conclude(outcome, ticks, odds, engine.into_roster(), seed))
    }

    /// Drive the next race in the background and return its snapshot stream.
    /// A race already running is cancelled first.
    pub async fn start_race(&mut self) -> Result<mpsc::UnboundedReceiver<RaceSnapshot>, RaceError> {
        if self.running.is_some() {
            warn!("Starting a new race; cancelling the one in progress");
            self.cancel_race().await?;
        }

        let (engine, seed) = self.next_engine()?;
        let mut handle = RaceDriver::spawn(engine, self.config.tick_delay());
        let snapshots = handle
            .take_snapshots()
            .ok_or_else(|| RaceError::Driver("snapshot stream unavailable".to_string()))?;
        self.running = Some(RunningRace { handle, seed });
        Ok(snapshots)
    }

    /// Wait for the background race to finish and settle it
    pub async fn finish_race(&mut self) -> Result<RaceReport, RaceError> {
        let RunningRace { handle, seed } = self.running.take().ok_or(RaceError::NoRaceInProgress)?;

        match handle.join().await? {
            DriveReport::Completed {
                outcome,
                ticks,
                odds,
                roster,
            } => Ok(self.conclude(outcome, ticks, odds, roster, seed)),
            DriveReport::Cancelled { .. } => Err(RaceError::Driver("race was cancelled".to_string())),
        }
    }

    /// Stop the background race. Statistics and the ledger stay as they were
    /// before it started, and pending stakes stay pending.
    pub async fn cancel_race(&mut self) -> Result<(), RaceError> {
        let RunningRace { handle, seed } = self.running.take().ok_or(RaceError::NoRaceInProgress)?;
        handle.cancel();

        match handle.join().await {
            Ok(DriveReport::Cancelled { ticks, .. }) => info!(seed, ticks, "Race cancelled"),
            Ok(DriveReport::Completed { ticks, .. }) => {
                info!(seed, ticks, "Race finished before cancellation; result discarded")
            }
            Err(e) => warn!(seed, error = %e, "Race driver failed during cancellation"),
        }
        Ok(())
    }

    /// Fold a completed race into the season
    fn conclude(
        &mut self,
        outcome: Outcome,
        ticks: u32,
        odds: OddsBoard,
        mut roster: Vec<Contestant>,
        seed: u64,
    ) -> RaceReport {
        let distance = self.config.distance as f64;
        let winner = outcome.winner();

        for contestant in &mut roster {
            contestant.stats.races_run += 1;
            contestant.stats.total_track_length += distance;
            if Some(contestant.id()) == winner {
                contestant.stats.triumphs += 1;
                update_aptitude_on_win(&mut contestant.stats, WIN_APTITUDE_DELTA);
                let finish = contestant.progress();
                update_record_time(&mut contestant.stats, finish);
            }
            contestant.reset();
        }

        let winner_name = winner
            .and_then(|id| roster.get(id.0))
            .map(|c| c.name().to_string());
        self.roster = roster;

        let ledger = self.ledger.settle(outcome, &odds);
        let record = RaceRecord {
            race_number: self.records.len() as u32 + 1,
            seed,
            ticks,
            winner: winner_name.clone(),
        };
        self.records.push(record.clone());

        info!(
            race = record.race_number,
            ticks,
            winner = winner_name.as_deref().unwrap_or("none"),
            "Race settled"
        );

        RaceReport {
            record,
            outcome: OutcomeEvent { winner_name },
            ledger,
        }
    }
}
