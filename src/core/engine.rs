//! Race engine
//!
//! Drives one race through `Pending -> Running -> Finished`. Each tick
//! visits contestants in roster order, which fixes both the random draw
//! sequence and the tie-break: when several contestants cross the line in
//! the same tick, the earliest in the roster is declared the winner.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::contestant::{Contestant, ContestantId, MovementPolicy};
use super::odds::OddsBoard;
use super::track::TrackEnvironment;
use crate::error::{validate_contestant_count, validate_distance, RaceError};
use crate::models::{ContestantSnapshot, RaceSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceState {
    Pending,
    Running,
    Finished,
    Cancelled,
}

impl fmt::Display for RaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RaceState::Pending => "pending",
            RaceState::Running => "running",
            RaceState::Finished => "finished",
            RaceState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Winner(ContestantId),
    NoWinner,
}

impl Outcome {
    pub fn winner(&self) -> Option<ContestantId> {
        match self {
            Outcome::Winner(id) => Some(*id),
            Outcome::NoWinner => None,
        }
    }
}

/// Per-race parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RaceSettings {
    pub distance: u32,
    pub movement: MovementPolicy,
    pub bonus_items: usize,
    pub bonus_tolerance: f64,
    pub seed: u64,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            distance: 20,
            movement: MovementPolicy::Stepwise,
            bonus_items: 2,
            bonus_tolerance: 5.0,
            seed: 42,
        }
    }
}

pub struct RaceEngine<R = ChaCha8Rng> {
    settings: RaceSettings,
    contestants: Vec<Contestant>,
    /// Roster as handed in, restored on cancellation
    baseline: Vec<Contestant>,
    track: TrackEnvironment,
    odds: OddsBoard,
    rng: R,
    state: RaceState,
    tick: u32,
    outcome: Option<Outcome>,
    outcome_delivered: bool,
}

impl RaceEngine<ChaCha8Rng> {
    /// Configure a race whose random source is seeded from `settings.seed`
    pub fn configure(settings: RaceSettings, roster: Vec<Contestant>) -> Result<Self, RaceError> {
        let rng = ChaCha8Rng::seed_from_u64(settings.seed);
        Self::with_rng(settings, roster, rng)
    }
}

impl<R: Rng> RaceEngine<R> {
    pub fn with_rng(settings: RaceSettings, roster: Vec<Contestant>, rng: R) -> Result<Self, RaceError> {
        validate_distance(settings.distance)?;
        validate_contestant_count(roster.len())?;
        if let Some((index, c)) = roster
            .iter()
            .enumerate()
            .find(|(i, c)| c.id() != ContestantId(*i))
        {
            return Err(RaceError::Configuration(format!(
                "Contestant {} has id {} but sits at position {}",
                c.name(),
                c.id(),
                index
            )));
        }

        let track = TrackEnvironment::new(settings.bonus_tolerance);
        Ok(Self {
            settings,
            baseline: roster.clone(),
            contestants: roster,
            track,
            odds: OddsBoard::default(),
            rng,
            state: RaceState::Pending,
            tick: 0,
            outcome: None,
            outcome_delivered: false,
        })
    }

    /// Reset the roster, fix the odds and lay out bonus items
    pub fn start(&mut self) -> Result<(), RaceError> {
        if self.state != RaceState::Pending {
            return Err(RaceError::Configuration(format!(
                "Cannot start a {} race",
                self.state
            )));
        }

        for contestant in &mut self.contestants {
            contestant.reset();
        }
        self.odds = OddsBoard::from_roster(&self.contestants);
        self.track.clear();
        self.track.scatter(
            &mut self.rng,
            self.settings.bonus_items,
            self.contestants.len(),
            self.settings.distance,
        );
        self.state = RaceState::Running;

        info!(
            seed = self.settings.seed,
            distance = self.settings.distance,
            contestants = self.contestants.len(),
            bonus_items = self.track.len(),
            "Race started"
        );
        Ok(())
    }

    /// Advance every active contestant once. Starts a pending race.
    pub fn tick(&mut self) -> Result<RaceSnapshot, RaceError> {
        match self.state {
            RaceState::Pending => self.start()?,
            RaceState::Running => {}
            RaceState::Finished | RaceState::Cancelled => {
                return Err(RaceError::Configuration(format!(
                    "Cannot tick a {} race",
                    self.state
                )));
            }
        }

        self.tick += 1;
        let distance = self.settings.distance as f64;
        let policy = self.settings.movement;

        for lane in 0..self.contestants.len() {
            let contestant = &mut self.contestants[lane];
            if !contestant.is_active() {
                continue;
            }

            contestant.advance(&mut self.rng, policy);
            if contestant.has_fallen() {
                debug!(tick = self.tick, contestant = contestant.name(), "Contestant fell");
                continue;
            }
            if contestant.progress() >= distance {
                contestant.mark_finished();
                continue;
            }

            if let Some(item) = self.track.take_at(lane, contestant.progress()) {
                contestant.consume_bonus();
                debug!(
                    tick = self.tick,
                    contestant = contestant.name(),
                    position = item.position,
                    "Bonus consumed"
                );
                if contestant.progress() >= distance {
                    contestant.mark_finished();
                }
            }
        }

        self.check_completion();
        Ok(self.snapshot())
    }

    fn check_completion(&mut self) {
        let winner = self
            .contestants
            .iter()
            .find(|c| c.has_finished())
            .map(|c| c.id());

        let outcome = match winner {
            Some(id) => {
                // Only the declared winner keeps the finished flag
                for c in self.contestants.iter_mut().filter(|c| c.id() != id) {
                    if c.has_finished() {
                        c.clear_finished();
                    }
                }
                Outcome::Winner(id)
            }
            None if self.contestants.iter().all(|c| c.has_fallen()) => Outcome::NoWinner,
            None if self.is_stalled() => {
                info!(tick = self.tick, "No active contestant can move; race stalled");
                Outcome::NoWinner
            }
            None => return,
        };

        self.state = RaceState::Finished;
        self.outcome = Some(outcome);
        info!(
            tick = self.tick,
            winner = self.winner_name().unwrap_or("none"),
            "Race finished"
        );
    }

    /// Under the stepwise policy a zero-skill contestant can neither move nor
    /// fall, so it only advances through a bonus item already in reach
    fn is_stalled(&self) -> bool {
        self.settings.movement == MovementPolicy::Stepwise
            && self
                .contestants
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_active())
                .all(|(lane, c)| c.skill() <= 0.0 && !self.track.has_item_at(lane, c.progress()))
    }

    /// Abandon the race. The roster goes back to how it was handed in and no
    /// outcome is produced. Returns false if the race had already finished.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            RaceState::Finished | RaceState::Cancelled => false,
            RaceState::Pending | RaceState::Running => {
                self.contestants = self.baseline.clone();
                for contestant in &mut self.contestants {
                    contestant.reset();
                }
                self.track.clear();
                self.outcome = None;
                self.state = RaceState::Cancelled;
                info!(tick = self.tick, "Race cancelled");
                true
            }
        }
    }

    /// The outcome, handed out once
    pub fn take_outcome(&mut self) -> Option<Outcome> {
        if self.outcome_delivered {
            return None;
        }
        let outcome = self.outcome?;
        self.outcome_delivered = true;
        Some(outcome)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn winner_name(&self) -> Option<&str> {
        let id = self.outcome?.winner()?;
        self.contestants.get(id.0).map(|c| c.name())
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn settings(&self) -> &RaceSettings {
        &self.settings
    }

    pub fn contestants(&self) -> &[Contestant] {
        &self.contestants
    }

    pub fn track(&self) -> &TrackEnvironment {
        &self.track
    }

    /// Odds fixed when the race started
    pub fn odds(&self) -> &OddsBoard {
        &self.odds
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            tick: self.tick,
            distance: self.settings.distance,
            state: self.state,
            contestants: self
                .contestants
                .iter()
                .map(|c| ContestantSnapshot {
                    id: c.id(),
                    name: c.name().to_string(),
                    symbol: c.symbol(),
                    progress: c.progress(),
                    fallen: c.has_fallen(),
                    finished: c.has_finished(),
                })
                .collect(),
            bonus_items: self.track.items().to_vec(),
        }
    }

    pub fn into_roster(self) -> Vec<Contestant> {
        self.contestants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contestant::Gear;
    use crate::core::track::BonusItem;
    use rand::rngs::mock::StepRng;

    fn roster(skills: &[f64]) -> Vec<Contestant> {
        skills
            .iter()
            .enumerate()
            .map(|(i, &s)| Contestant::new(ContestantId(i), format!("Runner{}", i), 'R', s))
            .collect()
    }

    fn settings(distance: u32, movement: MovementPolicy) -> RaceSettings {
        RaceSettings {
            distance,
            movement,
            bonus_items: 0,
            bonus_tolerance: 5.0,
            seed: 1,
        }
    }

    /// Every roll just below 1.0: no stumbles, stepwise moves only at skill 1.0
    fn high_rng() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    /// Every roll 0.0: everything stumbles or falls
    fn low_rng() -> StepRng {
        StepRng::new(0, 0)
    }

    fn run<R: Rng>(engine: &mut RaceEngine<R>) -> Vec<RaceSnapshot> {
        let mut trace = Vec::new();
        while engine.state() != RaceState::Finished {
            trace.push(engine.tick().unwrap());
            assert!(trace.len() < 10_000, "race did not terminate");
        }
        trace
    }

    #[test]
    fn test_configure_rejects_zero_distance() {
        let result = RaceEngine::configure(settings(0, MovementPolicy::Stepwise), roster(&[0.5, 0.5]));
        assert!(matches!(result, Err(RaceError::Configuration(_))));
    }

    #[test]
    fn test_configure_rejects_too_few_contestants() {
        let result = RaceEngine::configure(settings(20, MovementPolicy::Stepwise), roster(&[0.5]));
        assert!(matches!(result, Err(RaceError::Configuration(_))));
        let result = RaceEngine::configure(settings(20, MovementPolicy::Stepwise), Vec::new());
        assert!(matches!(result, Err(RaceError::Configuration(_))));
    }

    #[test]
    fn test_configure_rejects_misplaced_ids() {
        let mut contestants = roster(&[0.5, 0.5]);
        contestants.swap(0, 1);
        let result = RaceEngine::configure(settings(20, MovementPolicy::Stepwise), contestants);
        assert!(matches!(result, Err(RaceError::Configuration(_))));
    }

    #[test]
    fn test_state_transitions() {
        let mut engine =
            RaceEngine::with_rng(settings(2, MovementPolicy::Stepwise), roster(&[1.0, 0.5]), high_rng())
                .unwrap();
        assert_eq!(engine.state(), RaceState::Pending);

        engine.tick().unwrap();
        assert_eq!(engine.state(), RaceState::Running);

        engine.tick().unwrap();
        assert_eq!(engine.state(), RaceState::Finished);
        assert!(matches!(engine.tick(), Err(RaceError::Configuration(_))));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut engine = RaceEngine::configure(settings(20, MovementPolicy::Stepwise), roster(&[0.5, 0.5])).unwrap();
        engine.start().unwrap();
        assert!(engine.start().is_err());
    }

    #[test]
    fn test_all_fallen_means_no_winner() {
        let mut engine =
            RaceEngine::with_rng(settings(20, MovementPolicy::Gallop), roster(&[0.9, 0.9, 0.9]), low_rng())
                .unwrap();
        let snapshot = engine.tick().unwrap();

        assert_eq!(snapshot.state, RaceState::Finished);
        assert!(snapshot.contestants.iter().all(|c| c.fallen));
        assert_eq!(engine.outcome(), Some(Outcome::NoWinner));
        assert_eq!(engine.winner_name(), None);
    }

    #[test]
    fn test_stepwise_falls_penalize_skill() {
        let mut engine =
            RaceEngine::with_rng(settings(20, MovementPolicy::Stepwise), roster(&[0.5, 0.3]), low_rng())
                .unwrap();
        engine.tick().unwrap();

        assert_eq!(engine.outcome(), Some(Outcome::NoWinner));
        assert!((engine.contestants()[0].skill() - 0.4).abs() < 1e-9);
        assert!((engine.contestants()[1].skill() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_tie_goes_to_first_in_order() {
        // Both gallop 5 per tick and reach 10 on tick 2
        let mut engine =
            RaceEngine::with_rng(settings(10, MovementPolicy::Gallop), roster(&[0.5, 0.5]), high_rng())
                .unwrap();
        let trace = run(&mut engine);

        assert_eq!(trace.len(), 2);
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(0))));
        let last = trace.last().unwrap();
        assert!(last.contestants[0].finished);
        assert!(!last.contestants[1].finished);
        assert!(last.contestants[1].progress >= 10.0);
    }

    #[test]
    fn test_tie_ignores_margin_past_the_line() {
        let mut contestants = roster(&[0.5, 0.5]);
        contestants[1] = contestants[1].clone().with_gear([Gear::Armor]);

        let mut engine =
            RaceEngine::with_rng(settings(10, MovementPolicy::Gallop), contestants, high_rng()).unwrap();
        run(&mut engine);

        assert!(engine.contestants()[1].progress() > engine.contestants()[0].progress());
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(0))));
    }

    #[test]
    fn test_known_draws_stepwise_race() {
        // Rolls never fall below 0.99, so only the skill 1.0 contestant moves
        let mut engine = RaceEngine::with_rng(
            settings(20, MovementPolicy::Stepwise),
            roster(&[0.5, 1.0, 0.9]),
            high_rng(),
        )
        .unwrap();
        let trace = run(&mut engine);

        assert_eq!(trace.len(), 20);
        assert_eq!(engine.tick_count(), 20);
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(1))));
        assert_eq!(engine.winner_name(), Some("Runner1"));

        let last = trace.last().unwrap();
        assert_eq!(last.contestants[0].progress, 0.0);
        assert_eq!(last.contestants[1].progress, 20.0);
        assert_eq!(last.contestants[2].progress, 0.0);
    }

    #[test]
    fn test_seeded_race_is_reproducible() {
        let make = || {
            let s = RaceSettings {
                distance: 20,
                movement: MovementPolicy::Stepwise,
                bonus_items: 2,
                bonus_tolerance: 1.0,
                seed: 20240501,
            };
            RaceEngine::configure(s, roster(&[0.6, 0.7, 0.8])).unwrap()
        };

        let mut first = make();
        let mut second = make();
        let trace_a = run(&mut first);
        let trace_b = run(&mut second);

        assert_eq!(trace_a, trace_b);
        assert_eq!(first.outcome(), second.outcome());
    }

    #[test]
    fn test_seeded_stepwise_race_matches_recorded_run() {
        let s = RaceSettings {
            distance: 20,
            movement: MovementPolicy::Stepwise,
            bonus_items: 0,
            bonus_tolerance: 5.0,
            seed: 42,
        };
        let mut engine = RaceEngine::configure(s, roster(&[0.6, 0.7, 0.8])).unwrap();
        let trace = run(&mut engine);

        assert_eq!(trace.len(), 25);
        assert_eq!(engine.tick_count(), 25);
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(2))));

        let progress: Vec<f64> = engine.contestants().iter().map(|c| c.progress()).collect();
        assert_eq!(progress, vec![9.0, 15.0, 20.0]);
        let fallen: Vec<bool> = engine.contestants().iter().map(|c| c.has_fallen()).collect();
        assert_eq!(fallen, vec![true, false, false]);
        assert!((engine.contestants()[0].skill() - 0.5).abs() < 1e-9);
        assert!(engine.contestants()[2].has_finished());
    }

    #[test]
    fn test_progress_never_decreases() {
        let s = RaceSettings {
            distance: 30,
            movement: MovementPolicy::Gallop,
            bonus_items: 3,
            bonus_tolerance: 5.0,
            seed: 99,
        };
        let mut engine = RaceEngine::configure(s, roster(&[0.5, 0.5, 0.5])).unwrap();
        let trace = run(&mut engine);

        for pair in trace.windows(2) {
            for (before, after) in pair[0].contestants.iter().zip(&pair[1].contestants) {
                assert!(after.progress >= before.progress);
                assert!(!(before.fallen && after.progress != before.progress));
            }
        }
    }

    #[test]
    fn test_bonus_item_consumed_once() {
        let mut engine =
            RaceEngine::with_rng(settings(100, MovementPolicy::Gallop), roster(&[0.5, 0.5]), high_rng())
                .unwrap();
        engine.start().unwrap();
        engine.track = TrackEnvironment::with_items(0.5, vec![BonusItem { lane: 0, position: 5.0 }]);

        let snapshot = engine.tick().unwrap();
        assert!((snapshot.contestants[0].progress - 20.0).abs() < 1e-9);
        assert!((snapshot.contestants[1].progress - 5.0).abs() < 1e-9);
        assert!(snapshot.bonus_items.is_empty());

        let snapshot = engine.tick().unwrap();
        assert!((snapshot.contestants[0].progress - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_bonus_can_carry_over_the_line() {
        let mut engine =
            RaceEngine::with_rng(settings(15, MovementPolicy::Gallop), roster(&[0.5, 0.5]), high_rng())
                .unwrap();
        engine.start().unwrap();
        engine.track = TrackEnvironment::with_items(0.5, vec![BonusItem { lane: 1, position: 5.0 }]);

        engine.tick().unwrap();
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(1))));
    }

    #[test]
    fn test_cancel_discards_race_state() {
        let mut engine =
            RaceEngine::with_rng(settings(20, MovementPolicy::Stepwise), roster(&[0.5, 0.6]), low_rng())
                .unwrap();
        engine.start().unwrap();
        engine.contestants[0].advance(&mut StepRng::new(0, 0), MovementPolicy::Stepwise);
        assert!(engine.contestants()[0].has_fallen());

        assert!(engine.cancel());
        assert_eq!(engine.state(), RaceState::Cancelled);
        assert_eq!(engine.outcome(), None);
        assert_eq!(engine.take_outcome(), None);
        assert_eq!(engine.contestants()[0].skill(), 0.5);
        assert!(!engine.contestants()[0].has_fallen());
        assert!(matches!(engine.tick(), Err(RaceError::Configuration(_))));
        assert!(!engine.cancel());
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let mut engine =
            RaceEngine::with_rng(settings(1, MovementPolicy::Stepwise), roster(&[1.0, 1.0]), high_rng())
                .unwrap();
        run(&mut engine);
        assert!(!engine.cancel());
        assert_eq!(engine.state(), RaceState::Finished);
    }

    #[test]
    fn test_outcome_delivered_once() {
        let mut engine =
            RaceEngine::with_rng(settings(1, MovementPolicy::Stepwise), roster(&[1.0, 1.0]), high_rng())
                .unwrap();
        assert_eq!(engine.take_outcome(), None);
        run(&mut engine);

        assert_eq!(engine.take_outcome(), Some(Outcome::Winner(ContestantId(0))));
        assert_eq!(engine.take_outcome(), None);
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(0))));
    }

    #[test]
    fn test_zero_skill_race_stalls_without_winner() {
        let mut engine =
            RaceEngine::with_rng(settings(20, MovementPolicy::Stepwise), roster(&[0.0, 0.0]), high_rng())
                .unwrap();
        engine.tick().unwrap();
        assert_eq!(engine.state(), RaceState::Finished);
        assert_eq!(engine.outcome(), Some(Outcome::NoWinner));
    }

    #[test]
    fn test_zero_skill_contestant_chains_bonuses_to_win() {
        let mut engine =
            RaceEngine::with_rng(settings(40, MovementPolicy::Stepwise), roster(&[0.0, 0.0]), high_rng())
                .unwrap();
        engine.start().unwrap();
        let items = [2.0, 16.0, 31.0]
            .into_iter()
            .map(|position| BonusItem { lane: 0, position })
            .collect();
        engine.track = TrackEnvironment::with_items(5.0, items);

        let snapshot = engine.tick().unwrap();
        assert_eq!(snapshot.state, RaceState::Running);
        assert!((snapshot.contestants[0].progress - 15.0).abs() < 1e-9);
        assert_eq!(snapshot.bonus_items.len(), 2);

        let snapshot = engine.tick().unwrap();
        assert_eq!(snapshot.state, RaceState::Running);
        assert!((snapshot.contestants[0].progress - 30.0).abs() < 1e-9);

        let snapshot = engine.tick().unwrap();
        assert_eq!(snapshot.state, RaceState::Finished);
        assert!((snapshot.contestants[0].progress - 45.0).abs() < 1e-9);
        assert_eq!(snapshot.contestants[1].progress, 0.0);
        assert_eq!(engine.tick_count(), 3);
        assert_eq!(engine.outcome(), Some(Outcome::Winner(ContestantId(0))));
    }

    #[test]
    fn test_zero_skill_race_stalls_once_items_out_of_reach() {
        let mut engine =
            RaceEngine::with_rng(settings(40, MovementPolicy::Stepwise), roster(&[0.0, 0.0]), high_rng())
                .unwrap();
        engine.start().unwrap();
        engine.track = TrackEnvironment::with_items(
            5.0,
            vec![BonusItem { lane: 0, position: 2.0 }, BonusItem { lane: 0, position: 30.0 }],
        );

        let snapshot = engine.tick().unwrap();
        assert!((snapshot.contestants[0].progress - 15.0).abs() < 1e-9);
        assert_eq!(snapshot.bonus_items.len(), 1);
        assert_eq!(engine.state(), RaceState::Finished);
        assert_eq!(engine.outcome(), Some(Outcome::NoWinner));
    }

    #[test]
    fn test_odds_fixed_at_start() {
        let mut contestants = roster(&[1.0, 0.5]);
        contestants[0].stats.triumphs = 2;
        let mut engine =
            RaceEngine::with_rng(settings(5, MovementPolicy::Stepwise), contestants, high_rng()).unwrap();
        engine.start().unwrap();

        assert!((engine.odds().get(ContestantId(0)).unwrap() - 1.2).abs() < 1e-9);
        assert!((engine.odds().get(ContestantId(1)).unwrap() - 1.0).abs() < 1e-9);
    }
}
