//! Waiter tier calculation
//!
//! Composite score from z-score-normalized components:
//! turn time 0.3 (inverted, faster is better) + tip% 0.4 + covers 0.3,
//! squashed to 0–100. Tiers cut at score percentiles:
//! ≥ p75 strong, ≥ p25 standard, below developing.

use shared::models::WaiterTier;

use crate::analytics::aggregator::{PeerStats, WaiterSnapshot};

const TURN_TIME_WEIGHT: f64 = 0.3;
const TIP_PCT_WEIGHT: f64 = 0.4;
const COVERS_WEIGHT: f64 = 0.3;

/// Component z-scores and the final composite for one waiter
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub turn_time_z: f64,
    pub tip_pct_z: f64,
    pub covers_z: f64,
    /// 0..100
    pub composite: f64,
}

/// Tier assignment with estimated percentile
#[derive(Debug, Clone)]
pub struct TierResult {
    pub tier: WaiterTier,
    pub percentile: f64,
    pub composite: f64,
}

pub struct TierCalculator;

impl TierCalculator {
    /// Standard z-score; `invert` flips the sign for lower-is-better
    /// metrics (turn time).
    pub fn zscore(value: f64, mean: f64, std: f64, invert: bool) -> f64 {
        let std = if std == 0.0 { 1.0 } else { std };
        let z = (value - mean) / std;
        if invert { -z } else { z }
    }

    /// Map a z-score onto 0–100: z = −3 → 0, z = 0 → 50, z = +3 → 100.
    pub fn normalize(z: f64) -> f64 {
        let clamped = z.clamp(-3.0, 3.0);
        (50.0 + clamped * 16.67).clamp(0.0, 100.0)
    }

    /// Composite score for one snapshot against peer statistics.
    pub fn composite(snapshot: &WaiterSnapshot, peers: &PeerStats) -> ScoreBreakdown {
        let turn_z = Self::zscore(
            snapshot.avg_turn_time_minutes,
            peers.avg_turn_time,
            peers.std_turn_time,
            true,
        );
        let tip_z = Self::zscore(
            snapshot.avg_tip_percentage,
            peers.avg_tip_pct,
            peers.std_tip_pct,
            false,
        );
        let covers_z = Self::zscore(
            snapshot.avg_covers_per_shift,
            peers.avg_covers_per_shift,
            peers.std_covers_per_shift,
            false,
        );

        let composite = (Self::normalize(turn_z) * TURN_TIME_WEIGHT
            + Self::normalize(tip_z) * TIP_PCT_WEIGHT
            + Self::normalize(covers_z) * COVERS_WEIGHT)
            .clamp(0.0, 100.0);

        ScoreBreakdown { turn_time_z: turn_z, tip_pct_z: tip_z, covers_z, composite }
    }

    /// Interpolated percentile thresholds from a score population.
    pub fn percentiles(scores: &[f64]) -> (f64, f64, f64) {
        if scores.is_empty() {
            return (25.0, 50.0, 75.0);
        }
        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();

        let pick = |p: f64| -> f64 {
            let idx = p / 100.0 * (n - 1) as f64;
            let lower = idx.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let weight = idx - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        };

        (pick(25.0), pick(50.0), pick(75.0))
    }

    /// Tier from a composite against the population's p25/p75 cuts.
    pub fn assign(composite: f64, p25: f64, p75: f64) -> TierResult {
        let (tier, percentile) = if composite >= p75 {
            let pct = if p75 < 100.0 {
                75.0 + (composite - p75) / (100.0 - p75) * 25.0
            } else {
                100.0
            };
            (WaiterTier::Strong, pct)
        } else if composite >= p25 {
            let pct = if p75 > p25 {
                25.0 + (composite - p25) / (p75 - p25) * 50.0
            } else {
                50.0
            };
            (WaiterTier::Standard, pct)
        } else {
            let pct = if p25 > 0.0 { composite / p25 * 25.0 } else { 0.0 };
            (WaiterTier::Developing, pct)
        };

        TierResult { tier, percentile: percentile.clamp(0.0, 100.0), composite }
    }

    /// Two-pass tiering for a whole roster: composites first, then tiers
    /// against the roster's own percentiles.
    pub fn calculate_all(
        snapshots: &[WaiterSnapshot],
        peers: &PeerStats,
    ) -> Vec<(WaiterSnapshot, ScoreBreakdown, TierResult)> {
        let scored: Vec<(WaiterSnapshot, ScoreBreakdown)> = snapshots
            .iter()
            .map(|s| (s.clone(), Self::composite(s, peers)))
            .collect();

        let all: Vec<f64> = scored.iter().map(|(_, b)| b.composite).collect();
        let (p25, _, p75) = Self::percentiles(&all);

        scored
            .into_iter()
            .map(|(snapshot, breakdown)| {
                let tier = Self::assign(breakdown.composite, p25, p75);
                (snapshot, breakdown, tier)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(turn: f64, tip_pct: f64, covers: f64) -> WaiterSnapshot {
        WaiterSnapshot {
            avg_turn_time_minutes: turn,
            avg_tip_percentage: tip_pct,
            avg_covers_per_shift: covers,
            ..Default::default()
        }
    }

    #[test]
    fn average_performer_scores_near_fifty() {
        let peers = PeerStats::default();
        let breakdown = TierCalculator::composite(&snapshot(45.0, 18.0, 20.0), &peers);
        assert!((breakdown.composite - 50.0).abs() < 0.5, "{}", breakdown.composite);
    }

    #[test]
    fn fast_turns_raise_the_score() {
        let peers = PeerStats::default();
        let fast = TierCalculator::composite(&snapshot(35.0, 18.0, 20.0), &peers);
        let slow = TierCalculator::composite(&snapshot(55.0, 18.0, 20.0), &peers);
        assert!(fast.composite > slow.composite);
        assert!(fast.turn_time_z > 0.0);
    }

    #[test]
    fn composite_stays_in_bounds_for_outliers() {
        let peers = PeerStats::default();
        let stellar = TierCalculator::composite(&snapshot(5.0, 60.0, 100.0), &peers);
        let dire = TierCalculator::composite(&snapshot(200.0, 1.0, 0.5), &peers);
        assert!((0.0..=100.0).contains(&stellar.composite));
        assert!((0.0..=100.0).contains(&dire.composite));
        assert!(stellar.composite > 95.0);
        assert!(dire.composite < 10.0);
    }

    #[test]
    fn percentile_interpolation() {
        let scores = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let (p25, p50, p75) = TierCalculator::percentiles(&scores);
        assert_eq!(p25, 20.0);
        assert_eq!(p50, 30.0);
        assert_eq!(p75, 40.0);
    }

    #[test]
    fn tiers_cut_at_quartiles() {
        assert_eq!(TierCalculator::assign(80.0, 30.0, 70.0).tier, WaiterTier::Strong);
        assert_eq!(TierCalculator::assign(50.0, 30.0, 70.0).tier, WaiterTier::Standard);
        assert_eq!(TierCalculator::assign(20.0, 30.0, 70.0).tier, WaiterTier::Developing);
    }

    #[test]
    fn roster_tiering_splits_strong_and_developing() {
        let peers = PeerStats::default();
        let snapshots = vec![
            snapshot(35.0, 24.0, 30.0), // clearly strong
            snapshot(45.0, 18.0, 20.0),
            snapshot(44.0, 19.0, 21.0),
            snapshot(60.0, 12.0, 10.0), // clearly developing
        ];
        let results = TierCalculator::calculate_all(&snapshots, &peers);
        assert_eq!(results[0].2.tier, WaiterTier::Strong);
        assert_eq!(results[3].2.tier, WaiterTier::Developing);
        for (_, breakdown, tier) in &results {
            assert!((0.0..=100.0).contains(&breakdown.composite));
            assert!((0.0..=100.0).contains(&tier.percentile));
        }
    }
}
