//! Stake Metrics
//!
//! Hit rate, ROI and drawdown over an actor's stake history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Actor, ContestantId, Stake, StakeOutcome};

/// Wagering performance of one actor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StakeMetrics {
    // Basic metrics
    pub total_stakes: usize,
    pub winning_stakes: usize,
    /// Stakes replaced by a later placement before their race settled
    pub forfeited_stakes: usize,
    pub hit_rate: f64,
    pub roi: f64,

    pub total_staked: f64,
    /// Principal plus earnings paid back on winning stakes
    pub total_returned: f64,
    pub avg_stake: f64,

    // Win/Loss
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_profit: f64,
    pub max_drawdown: f64,
}

/// Net result of one stake. A stake that never settled was forfeited.
pub fn stake_profit(stake: &Stake) -> f64 {
    match stake.outcome {
        Some(StakeOutcome::Win) => stake.earnings,
        Some(StakeOutcome::Loss) | None => -stake.amount,
    }
}

/// Every stake of `actor` except the one still waiting for a race
pub fn closed_stakes(actor: &Actor) -> Vec<&Stake> {
    let pending = actor.pending_stake().map(|s| s.sequence);
    actor
        .stakes()
        .into_iter()
        .filter(|s| Some(s.sequence) != pending)
        .collect()
}

/// Calculate metrics from stakes given in placement order
pub fn calculate_metrics(stakes: &[&Stake]) -> StakeMetrics {
    if stakes.is_empty() {
        return StakeMetrics::default();
    }

    let total_stakes = stakes.len();
    let winning_stakes = stakes.iter().filter(|s| s.is_winning()).count();
    let forfeited_stakes = stakes.iter().filter(|s| s.outcome.is_none()).count();
    let hit_rate = winning_stakes as f64 / total_stakes as f64;

    let total_staked: f64 = stakes.iter().map(|s| s.amount).sum();
    let avg_stake = total_staked / total_stakes as f64;
    let total_returned: f64 = stakes
        .iter()
        .filter(|s| s.is_winning())
        .map(|s| s.amount + s.earnings)
        .sum();

    let profits: Vec<f64> = stakes.iter().map(|s| stake_profit(s)).collect();
    let gross_profit: f64 = profits.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = profits.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    let net_profit: f64 = profits.iter().sum();

    // Drawdown over the cumulative result
    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    for p in &profits {
        cumulative += p;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }

    let roi = if total_staked > 0.0 {
        net_profit / total_staked
    } else {
        0.0
    };

    StakeMetrics {
        total_stakes,
        winning_stakes,
        forfeited_stakes,
        hit_rate,
        roi,
        total_staked,
        total_returned,
        avg_stake,
        gross_profit,
        gross_loss,
        net_profit,
        max_drawdown,
    }
}

/// Results grouped by the contestant backed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantBreakdown {
    pub contestant: ContestantId,
    pub stakes: usize,
    pub wins: usize,
    pub hit_rate: f64,
    pub staked: f64,
    pub profit: f64,
    pub roi: f64,
}

/// Analyze stakes by contestant, ordered by contestant id
pub fn analyze_by_contestant(stakes: &[&Stake]) -> Vec<ContestantBreakdown> {
    let mut grouped: BTreeMap<ContestantId, Vec<&Stake>> = BTreeMap::new();
    for stake in stakes {
        grouped.entry(stake.contestant).or_default().push(stake);
    }

    grouped
        .into_iter()
        .map(|(contestant, group)| {
            let total = group.len();
            let wins = group.iter().filter(|s| s.is_winning()).count();
            let staked: f64 = group.iter().map(|s| s.amount).sum();
            let profit: f64 = group.iter().map(|s| stake_profit(s)).sum();

            ContestantBreakdown {
                contestant,
                stakes: total,
                wins,
                hit_rate: wins as f64 / total as f64,
                staked,
                profit,
                roi: if staked > 0.0 { profit / staked } else { 0.0 },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActorId, Outcome, WageringLedger};
    use crate::core::{Contestant, OddsBoard};
    use chrono::Utc;

    fn stake(sequence: u64, contestant: usize, amount: f64, outcome: Option<StakeOutcome>, earnings: f64) -> Stake {
        Stake {
            actor: ActorId(0),
            contestant: ContestantId(contestant),
            amount,
            sequence,
            placed_at: Utc::now(),
            outcome,
            earnings,
        }
    }

    fn create_test_stakes() -> Vec<Stake> {
        vec![
            stake(0, 0, 20.0, Some(StakeOutcome::Win), 24.0),
            stake(1, 1, 10.0, Some(StakeOutcome::Loss), 0.0),
            stake(2, 1, 5.0, None, 0.0),
            stake(3, 0, 15.0, Some(StakeOutcome::Loss), 0.0),
        ]
    }

    #[test]
    fn test_calculate_metrics() {
        let stakes = create_test_stakes();
        let refs: Vec<&Stake> = stakes.iter().collect();
        let metrics = calculate_metrics(&refs);

        assert_eq!(metrics.total_stakes, 4);
        assert_eq!(metrics.winning_stakes, 1);
        assert_eq!(metrics.forfeited_stakes, 1);
        assert!((metrics.hit_rate - 0.25).abs() < 1e-9);
        assert!((metrics.total_staked - 50.0).abs() < 1e-9);
        assert!((metrics.total_returned - 44.0).abs() < 1e-9);
        assert!((metrics.gross_profit - 24.0).abs() < 1e-9);
        assert!((metrics.gross_loss - 30.0).abs() < 1e-9);
        assert!((metrics.net_profit + 6.0).abs() < 1e-9);
        assert!((metrics.roi + 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_metrics_empty() {
        let metrics = calculate_metrics(&[]);
        assert_eq!(metrics, StakeMetrics::default());
    }

    #[test]
    fn test_max_drawdown() {
        let stakes = create_test_stakes();
        let refs: Vec<&Stake> = stakes.iter().collect();
        let metrics = calculate_metrics(&refs);

        // Cumulative: 24, 14, 9, -6
        assert!((metrics.max_drawdown - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_by_contestant() {
        let stakes = create_test_stakes();
        let refs: Vec<&Stake> = stakes.iter().collect();
        let analysis = analyze_by_contestant(&refs);

        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[0].contestant, ContestantId(0));
        assert_eq!(analysis[0].stakes, 2);
        assert_eq!(analysis[0].wins, 1);
        assert!((analysis[0].profit - 9.0).abs() < 1e-9);

        assert_eq!(analysis[1].contestant, ContestantId(1));
        assert_eq!(analysis[1].wins, 0);
        assert!((analysis[1].profit + 15.0).abs() < 1e-9);
        assert!((analysis[1].roi + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_closed_stakes_skip_pending() {
        let roster = vec![
            Contestant::new(ContestantId(0), "A", 'A', 0.5),
            Contestant::new(ContestantId(1), "B", 'B', 0.5),
        ];
        let board = OddsBoard::from_roster(&roster);

        let mut ledger = WageringLedger::new(roster.len());
        let id = ledger.open_account("alice", 100.0).unwrap();
        ledger.place_stake(id, ContestantId(0), 10.0).unwrap();
        ledger.settle(Outcome::Winner(ContestantId(0)), &board);
        ledger.place_stake(id, ContestantId(1), 5.0).unwrap();

        let actor = ledger.actor(id).unwrap();
        let closed = closed_stakes(actor);
        assert_eq!(closed.len(), 1);
        assert!(closed[0].is_winning());
    }
}
