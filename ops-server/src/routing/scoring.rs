//! Routing score math — pure functions, no I/O
//!
//! Table score:
//! `50 + 10·type_match + 10·location_match − 2·excess_seats`
//!
//! Waiter priority:
//! `composite·W_eff − (tables/max)·W_work − tip_share·W_tip − recency`
//! with a linear-decay recency penalty and an underserved override that
//! keeps covers/tips from concentrating.

use shared::models::{LocationPreference, RoutingSettings, ShiftStatus, TablePreference};
use shared::models::DiningTable;

use crate::db::repository::waiter::CandidateWaiter;

const BASE_TABLE_SCORE: f64 = 50.0;
const TYPE_MATCH_WEIGHT: f64 = 10.0;
const LOCATION_MATCH_WEIGHT: f64 = 10.0;
const CAPACITY_PENALTY_PER_SEAT: f64 = 2.0;

/// Fraction of the pool mean below which a waiter counts as underserved
const UNDERSERVED_RATIO: f64 = 0.5;

/// A table with its routing score
#[derive(Debug, Clone)]
pub struct ScoredTable {
    pub table: DiningTable,
    pub score: f64,
    pub type_matched: bool,
    pub location_matched: bool,
}

/// A candidate waiter with its computed priority
#[derive(Debug, Clone)]
pub struct RankedWaiter {
    pub candidate: CandidateWaiter,
    pub priority: f64,
    pub recency_penalty: f64,
    pub underserved: bool,
}

/// Score and sort candidate tables, best first.
///
/// Ties break on lowest table number, then earliest creation.
pub fn score_tables(
    tables: Vec<DiningTable>,
    party_size: i64,
    table_preference: TablePreference,
    location_preference: LocationPreference,
) -> Vec<ScoredTable> {
    let mut scored: Vec<ScoredTable> = tables
        .into_iter()
        .map(|table| {
            let type_matched =
                !table_preference.is_none() && table_preference.matches(table.table_type);
            let location_matched =
                !location_preference.is_none() && location_preference.matches(table.location);

            let excess = (table.capacity - party_size).max(0) as f64;
            let mut score = BASE_TABLE_SCORE - excess * CAPACITY_PENALTY_PER_SEAT;
            if type_matched {
                score += TYPE_MATCH_WEIGHT;
            }
            if location_matched {
                score += LOCATION_MATCH_WEIGHT;
            }

            ScoredTable { table, score, type_matched, location_matched }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.table.table_number.cmp(&b.table.table_number))
            .then(a.table.created_at.cmp(&b.table.created_at))
    });
    scored
}

/// Linear-decay recency penalty: full weight at 0 minutes, zero at the
/// window edge.
fn recency_penalty(last_seated_at: Option<i64>, now_millis: i64, config: &RoutingSettings) -> f64 {
    let Some(seated_at) = last_seated_at else {
        return 0.0;
    };
    let window_minutes = config.recency_penalty_minutes as f64;
    if window_minutes <= 0.0 {
        return 0.0;
    }
    let minutes_since = (now_millis - seated_at) as f64 / 60_000.0;
    if minutes_since >= window_minutes || minutes_since < 0.0 {
        return 0.0;
    }
    (1.0 - minutes_since / window_minutes) * config.recency_penalty_weight
}

fn priority(
    candidate: &CandidateWaiter,
    total_tips_in_pool: f64,
    recency: f64,
    config: &RoutingSettings,
) -> f64 {
    let efficiency = candidate.composite_score * config.efficiency_weight;

    let max_tables = config.max_tables_per_waiter.max(1) as f64;
    let workload = (candidate.current_tables as f64 / max_tables) * config.workload_penalty;

    let tip_share = (candidate.shift_tips / total_tips_in_pool.max(1.0)) * config.tip_penalty;

    efficiency - workload - tip_share - recency
}

/// Candidates eligible to take a party right now
fn is_eligible(candidate: &CandidateWaiter, config: &RoutingSettings) -> bool {
    candidate.role.can_take_tables()
        && candidate.shift_status == ShiftStatus::Active
        && candidate.current_tables < config.max_tables_per_waiter
}

/// Score and rank waiters, highest priority first, applying the
/// underserved override.
///
/// When the top waiter is sitting under an active recency penalty and some
/// other candidate has both covers and tips below half the pool mean, that
/// underserved candidate jumps the queue.
pub fn rank_waiters(
    candidates: &[CandidateWaiter],
    config: &RoutingSettings,
    now_millis: i64,
) -> Vec<RankedWaiter> {
    let eligible: Vec<&CandidateWaiter> =
        candidates.iter().filter(|c| is_eligible(c, config)).collect();
    if eligible.is_empty() {
        return Vec::new();
    }

    let total_tips: f64 = eligible.iter().map(|c| c.shift_tips).sum();
    let mean_covers =
        eligible.iter().map(|c| c.shift_covers as f64).sum::<f64>() / eligible.len() as f64;
    let mean_tips = total_tips / eligible.len() as f64;

    let mut ranked: Vec<RankedWaiter> = eligible
        .into_iter()
        .map(|candidate| {
            let recency = recency_penalty(candidate.last_seated_at, now_millis, config);
            let underserved = mean_covers > 0.0
                && mean_tips > 0.0
                && (candidate.shift_covers as f64) < UNDERSERVED_RATIO * mean_covers
                && candidate.shift_tips < UNDERSERVED_RATIO * mean_tips;
            RankedWaiter {
                priority: priority(candidate, total_tips, recency, config),
                recency_penalty: recency,
                underserved,
                candidate: candidate.clone(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.candidate.waiter_id.cmp(&b.candidate.waiter_id))
    });

    // Underserved override
    if ranked[0].recency_penalty > 0.0 {
        if let Some(pos) = ranked.iter().position(|r| r.underserved) {
            if pos > 0 {
                let promoted = ranked.remove(pos);
                tracing::debug!(
                    waiter_id = %promoted.candidate.waiter_id,
                    "Underserved override: promoting waiter past recency-penalized top"
                );
                ranked.insert(0, promoted);
            }
        }
    }

    ranked
}
