//! Fairness evaluator
//!
//! Measures how evenly hours and prime-shift exposure are spread across
//! staff. The Gini coefficient uses the standard pairwise formula
//! `G = Σ|xi−xj| / (2·N·Σxi)`; per-waiter fairness is
//! `50 − 50·|hours_share − 1/N|` clipped to [0, 100].

use serde::Serialize;

/// Gini thresholds for the qualitative rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// A schedule is considered balanced below this hours Gini
pub const BALANCED_GINI_THRESHOLD: f64 = 0.25;

/// Pairwise Gini coefficient, 0 = perfect equality, 1 = maximal inequality.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let mut abs_diff_sum = 0.0;
    for a in values {
        for b in values {
            abs_diff_sum += (a - b).abs();
        }
    }
    (abs_diff_sum / (2.0 * n as f64 * total)).clamp(0.0, 1.0)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub fn rate_gini(gini: f64) -> FairnessRating {
    if gini < 0.10 {
        FairnessRating::Excellent
    } else if gini < 0.20 {
        FairnessRating::Good
    } else if gini < 0.30 {
        FairnessRating::Fair
    } else {
        FairnessRating::Poor
    }
}

/// One staff member's slice of the fairness report
#[derive(Debug, Clone, Serialize)]
pub struct StaffFairness {
    pub waiter_id: String,
    pub name: String,
    pub weekly_hours: f64,
    pub prime_shift_count: i64,
    pub prime_shift_hours: f64,
    /// 0..100, 50 = exactly the fair share
    pub fairness_score: f64,
}

/// Fairness report for a schedule state
#[derive(Debug, Clone, Serialize)]
pub struct FairnessReport {
    pub hours_gini: f64,
    pub prime_shift_gini: f64,
    pub hours_std_dev: f64,
    pub is_balanced: bool,
    pub rating: FairnessRating,
    pub staff: Vec<StaffFairness>,
    pub issues: Vec<String>,
}

/// Inputs: per-waiter assigned hours and prime exposure
#[derive(Debug, Clone)]
pub struct StaffHours {
    pub waiter_id: String,
    pub name: String,
    pub hours: f64,
    pub prime_hours: f64,
    pub prime_count: i64,
}

/// Evaluate fairness over the current assignment state.
pub fn evaluate(staff: &[StaffHours]) -> FairnessReport {
    if staff.is_empty() {
        return FairnessReport {
            hours_gini: 0.0,
            prime_shift_gini: 0.0,
            hours_std_dev: 0.0,
            is_balanced: true,
            rating: FairnessRating::Excellent,
            staff: Vec::new(),
            issues: Vec::new(),
        };
    }

    let hours: Vec<f64> = staff.iter().map(|s| s.hours).collect();
    let prime_hours: Vec<f64> = staff.iter().map(|s| s.prime_hours).collect();

    let hours_gini = gini(&hours);
    let prime_gini = if prime_hours.iter().any(|h| *h > 0.0) {
        gini(&prime_hours)
    } else {
        0.0
    };
    let hours_std = std_dev(&hours);

    let total_hours: f64 = hours.iter().sum();
    let fair_share = 1.0 / staff.len() as f64;

    let staff_out: Vec<StaffFairness> = staff
        .iter()
        .map(|s| {
            let share = if total_hours > 0.0 { s.hours / total_hours } else { fair_share };
            let score = (50.0 - 50.0 * (share - fair_share).abs()).clamp(0.0, 100.0);
            StaffFairness {
                waiter_id: s.waiter_id.clone(),
                name: s.name.clone(),
                weekly_hours: s.hours,
                prime_shift_count: s.prime_count,
                prime_shift_hours: s.prime_hours,
                fairness_score: score,
            }
        })
        .collect();

    let mut issues = Vec::new();
    if hours_gini >= BALANCED_GINI_THRESHOLD {
        issues.push(format!("Hours distribution is unequal (Gini: {hours_gini:.2})"));
    }
    if prime_gini >= BALANCED_GINI_THRESHOLD {
        issues.push(format!("Prime shift distribution is unequal (Gini: {prime_gini:.2})"));
    }

    FairnessReport {
        hours_gini,
        prime_shift_gini: prime_gini,
        hours_std_dev: hours_std,
        is_balanced: hours_gini < BALANCED_GINI_THRESHOLD,
        rating: rate_gini(hours_gini),
        staff: staff_out,
        issues,
    }
}

/// Fairness impact of handing `added_hours` to `staff_index`, −50..+50.
///
/// Positive when the assignment reduces the hours Gini against the current
/// running state; prime slots get a bonus when the receiver is below the
/// average prime exposure and a penalty when hoarding.
pub fn assignment_impact(
    staff: &[StaffHours],
    staff_index: usize,
    added_hours: f64,
    is_prime: bool,
) -> f64 {
    if staff.is_empty() || staff_index >= staff.len() {
        return 0.0;
    }

    let current_hours: Vec<f64> = staff.iter().map(|s| s.hours).collect();
    let current_gini = gini(&current_hours);
    let current_avg = current_hours.iter().sum::<f64>() / current_hours.len() as f64;

    let mut simulated = current_hours.clone();
    simulated[staff_index] += added_hours;
    let simulated_gini = gini(&simulated);
    let simulated_avg = simulated.iter().sum::<f64>() / simulated.len() as f64;

    let gini_change = simulated_gini - current_gini;
    let distance_change = (simulated[staff_index] - simulated_avg).abs()
        - (current_hours[staff_index] - current_avg).abs();

    let mut impact = -gini_change * 100.0 - distance_change * 2.0;

    if is_prime {
        let prime_counts: Vec<f64> = staff.iter().map(|s| s.prime_count as f64).collect();
        let avg_prime = prime_counts.iter().sum::<f64>() / prime_counts.len() as f64;
        let own = prime_counts[staff_index];
        if own < avg_prime {
            impact += 10.0;
        } else if own > avg_prime {
            impact -= 10.0;
        }
    }

    impact.clamp(-50.0, 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(entries: &[(&str, f64, f64, i64)]) -> Vec<StaffHours> {
        entries
            .iter()
            .map(|(id, hours, prime_hours, prime_count)| StaffHours {
                waiter_id: id.to_string(),
                name: id.to_uppercase(),
                hours: *hours,
                prime_hours: *prime_hours,
                prime_count: *prime_count,
            })
            .collect()
    }

    #[test]
    fn equal_hours_is_perfect_equality() {
        assert_eq!(gini(&[30.0, 30.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn one_person_with_everything_approaches_one() {
        // Pairwise formula on [x, 0, 0, 0] gives (N-1)/N
        let g = gini(&[40.0, 0.0, 0.0, 0.0]);
        assert!((g - 0.75).abs() < 1e-9);
    }

    #[test]
    fn gini_is_bounded() {
        for values in [vec![0.0, 0.0], vec![5.0], vec![], vec![10.0, 20.0, 30.0]] {
            let g = gini(&values);
            assert!((0.0..=1.0).contains(&g));
        }
    }

    #[test]
    fn fairness_score_centers_at_fifty_for_fair_share() {
        let report = evaluate(&staff(&[("a", 30.0, 0.0, 0), ("b", 30.0, 0.0, 0)]));
        for s in &report.staff {
            assert_eq!(s.fairness_score, 50.0);
        }
        assert!(report.is_balanced);
        assert_eq!(report.rating, FairnessRating::Excellent);
    }

    #[test]
    fn skewed_hours_flag_imbalance() {
        let report = evaluate(&staff(&[
            ("a", 48.0, 0.0, 0),
            ("b", 4.0, 0.0, 0),
            ("c", 4.0, 0.0, 0),
        ]));
        assert!(!report.is_balanced);
        assert!(report.hours_gini >= BALANCED_GINI_THRESHOLD);
        assert!(!report.issues.is_empty());
        for s in &report.staff {
            assert!((0.0..=100.0).contains(&s.fairness_score));
        }
    }

    #[test]
    fn giving_hours_to_the_starved_improves_fairness() {
        let state = staff(&[("busy", 32.0, 0.0, 0), ("starved", 8.0, 0.0, 0)]);
        let to_starved = assignment_impact(&state, 1, 6.0, false);
        let to_busy = assignment_impact(&state, 0, 6.0, false);
        assert!(to_starved > 0.0, "boosting the starved should score positive: {to_starved}");
        assert!(to_busy < 0.0, "piling onto the busy should score negative: {to_busy}");
        assert!((-50.0..=50.0).contains(&to_starved));
    }

    #[test]
    fn prime_bonus_favours_the_underexposed() {
        let state = staff(&[("hoarder", 20.0, 12.0, 3), ("none", 20.0, 0.0, 0)]);
        let to_none = assignment_impact(&state, 1, 4.0, true);
        let to_hoarder = assignment_impact(&state, 0, 4.0, true);
        assert!(to_none > to_hoarder);
    }

    #[test]
    fn rating_thresholds() {
        assert_eq!(rate_gini(0.05), FairnessRating::Excellent);
        assert_eq!(rate_gini(0.15), FairnessRating::Good);
        assert_eq!(rate_gini(0.25), FairnessRating::Fair);
        assert_eq!(rate_gini(0.35), FairnessRating::Poor);
    }
}
