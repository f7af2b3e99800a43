//! Victory odds and aptitude adaptation
//!
//! Odds are derived only from a contestant's lifetime statistics:
//!     odds = 1.0 + 0.1 * triumphs + 0.05 * aptitude
//!
//! They are fixed for the duration of a race by taking an [`OddsBoard`]
//! when the race starts.

use super::contestant::{Contestant, ContestantId, ContestantStats};
use serde::{Deserialize, Serialize};

/// Aptitude credited to the winner of a race
pub const WIN_APTITUDE_DELTA: f64 = 10.0;

/// Divisor turning finish progress into a record time
const TIME_SCALE: f64 = 100.0;

/// Odds multiplier for a contestant's current statistics
pub fn victory_odds(stats: &ContestantStats) -> f64 {
    1.0 + 0.1 * stats.triumphs as f64 + 0.05 * stats.aptitude
}

/// Credit `delta` aptitude and recompute the running average over races run
///
/// With no races run yet the average is left unchanged.
pub fn update_aptitude_on_win(stats: &mut ContestantStats, delta: f64) {
    stats.aptitude_accumulator += delta;
    if stats.races_run > 0 {
        stats.aptitude = stats.aptitude_accumulator / stats.races_run as f64;
    }
}

/// Replace the record time if `finish_progress / 100` beats it
pub fn update_record_time(stats: &mut ContestantStats, finish_progress: f64) {
    let candidate = finish_progress / TIME_SCALE;
    if candidate < stats.best_time {
        stats.best_time = candidate;
    }
}

/// Odds of every contestant, fixed at race start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsBoard {
    odds: Vec<f64>,
}

impl OddsBoard {
    pub fn from_roster(roster: &[Contestant]) -> Self {
        Self {
            odds: roster.iter().map(|c| victory_odds(&c.stats)).collect(),
        }
    }

    pub fn get(&self, id: ContestantId) -> Option<f64> {
        self.odds.get(id.0).copied()
    }

    pub fn len(&self) -> usize {
        self.odds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.odds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContestantId, f64)> + '_ {
        self.odds
            .iter()
            .enumerate()
            .map(|(i, &o)| (ContestantId(i), o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_odds_fresh_contestant() {
        let stats = ContestantStats::default();
        assert!((victory_odds(&stats) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_odds_with_history() {
        let stats = ContestantStats {
            triumphs: 2,
            aptitude: 4.0,
            ..Default::default()
        };
        assert!((victory_odds(&stats) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_aptitude_running_average() {
        let mut stats = ContestantStats {
            races_run: 4,
            ..Default::default()
        };
        update_aptitude_on_win(&mut stats, WIN_APTITUDE_DELTA);
        assert!((stats.aptitude - 2.5).abs() < 1e-12);

        stats.races_run = 5;
        update_aptitude_on_win(&mut stats, WIN_APTITUDE_DELTA);
        assert!((stats.aptitude - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_aptitude_no_races_run() {
        let mut stats = ContestantStats {
            aptitude: 1.5,
            ..Default::default()
        };
        update_aptitude_on_win(&mut stats, WIN_APTITUDE_DELTA);
        assert_eq!(stats.aptitude, 1.5);
        assert_eq!(stats.aptitude_accumulator, 10.0);
        assert!(stats.aptitude.is_finite());
    }

    #[test]
    fn test_record_time_only_improves() {
        let mut stats = ContestantStats::default();
        assert!(stats.best_time.is_infinite());

        update_record_time(&mut stats, 25.0);
        assert!((stats.best_time - 0.25).abs() < 1e-12);

        update_record_time(&mut stats, 40.0);
        assert!((stats.best_time - 0.25).abs() < 1e-12);

        update_record_time(&mut stats, 20.0);
        assert!((stats.best_time - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_board_from_roster() {
        let mut a = Contestant::new(ContestantId(0), "A", 'A', 0.5);
        a.stats.triumphs = 2;
        let b = Contestant::new(ContestantId(1), "B", 'B', 0.5);

        let board = OddsBoard::from_roster(&[a, b]);
        assert_eq!(board.len(), 2);
        assert!((board.get(ContestantId(0)).unwrap() - 1.2).abs() < 1e-12);
        assert!((board.get(ContestantId(1)).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(board.get(ContestantId(2)), None);
    }

    proptest! {
        #[test]
        fn prop_odds_formula(triumphs in 0u32..10_000, aptitude in 0.0f64..1_000.0) {
            let stats = ContestantStats { triumphs, aptitude, ..Default::default() };
            let expected = 1.0 + 0.1 * triumphs as f64 + 0.05 * aptitude;
            prop_assert!((victory_odds(&stats) - expected).abs() < 1e-9);
        }
    }
}
