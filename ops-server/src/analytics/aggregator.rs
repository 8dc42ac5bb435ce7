//! Metrics aggregation from raw visits and shifts
//!
//! Produces the rolling per-waiter snapshots the tier calculator consumes,
//! and the peer statistics used for z-score normalization.

use chrono::{Days, NaiveDate};
use shared::{AppError, AppResult};
use sqlx::SqlitePool;

use crate::db::repository::{visit, waiter};
use crate::utils::time::range_millis;

/// Aggregated performance for one waiter over a trailing window
#[derive(Debug, Clone, Default)]
pub struct WaiterSnapshot {
    pub waiter_id: String,
    pub restaurant_id: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,

    pub total_visits: i64,
    pub total_covers: i64,
    pub total_tips: f64,
    pub total_sales: f64,
    pub shifts_worked: i64,

    pub avg_turn_time_minutes: f64,
    pub avg_tip_percentage: f64,
    pub avg_check_size: f64,
    pub avg_covers_per_shift: f64,
}

/// Peer averages and deviations for z-score context.
///
/// Falls back to industry-typical values when a restaurant has no history
/// yet, so the first tier run still produces sane scores.
#[derive(Debug, Clone)]
pub struct PeerStats {
    pub avg_turn_time: f64,
    pub std_turn_time: f64,
    pub avg_tip_pct: f64,
    pub std_tip_pct: f64,
    pub avg_covers_per_shift: f64,
    pub std_covers_per_shift: f64,
}

impl Default for PeerStats {
    fn default() -> Self {
        Self {
            avg_turn_time: 45.0,
            std_turn_time: 10.0,
            avg_tip_pct: 18.0,
            std_tip_pct: 3.0,
            avg_covers_per_shift: 20.0,
            std_covers_per_shift: 5.0,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 1.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    let s = variance.sqrt();
    if s == 0.0 { 1.0 } else { s }
}

pub struct MetricsAggregator {
    pool: SqlitePool,
}

impl MetricsAggregator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Aggregate one waiter's visits over `[end_date − days, end_date)`.
    pub async fn waiter_snapshot(
        &self,
        waiter_id: &str,
        days: u64,
        end_date: NaiveDate,
    ) -> AppResult<WaiterSnapshot> {
        let w = waiter::get(&self.pool, waiter_id).await.map_err(AppError::from)?;
        let period_start = end_date - Days::new(days);
        let (start_millis, end_millis) = range_millis(period_start, days);

        let visits = visit::find_for_waiter_in_range(&self.pool, waiter_id, start_millis, end_millis)
            .await
            .map_err(AppError::from)?;

        let mut snapshot = WaiterSnapshot {
            waiter_id: waiter_id.to_string(),
            restaurant_id: w.restaurant_id,
            period_start: Some(period_start),
            period_end: Some(end_date),
            ..Default::default()
        };

        let mut turn_times = Vec::new();
        let mut tip_pcts = Vec::new();

        for v in &visits {
            snapshot.total_visits += 1;
            snapshot.total_covers += v.party_size;
            if let Some(tip) = v.tip {
                snapshot.total_tips += tip;
            }
            if let Some(total) = v.total {
                snapshot.total_sales += total;
                if let Some(tip) = v.tip {
                    if total > 0.0 {
                        tip_pcts.push(tip / total * 100.0);
                    }
                }
            }
            if let Some(duration) = v.duration_minutes {
                if duration > 0.0 {
                    turn_times.push(duration);
                }
            }
        }

        let shifts_worked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shifts WHERE waiter_id = ? AND clock_in >= ? AND clock_in < ?",
        )
        .bind(waiter_id)
        .bind(start_millis)
        .bind(end_millis)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
        snapshot.shifts_worked = shifts_worked;

        snapshot.avg_turn_time_minutes = mean(&turn_times);
        snapshot.avg_tip_percentage = mean(&tip_pcts);
        if snapshot.total_visits > 0 {
            snapshot.avg_check_size = snapshot.total_sales / snapshot.total_visits as f64;
        }
        if snapshot.shifts_worked > 0 {
            snapshot.avg_covers_per_shift =
                snapshot.total_covers as f64 / snapshot.shifts_worked as f64;
        }

        Ok(snapshot)
    }

    /// Snapshots for every active waiter in a restaurant.
    pub async fn all_waiter_snapshots(
        &self,
        restaurant_id: &str,
        days: u64,
        end_date: NaiveDate,
    ) -> AppResult<Vec<WaiterSnapshot>> {
        let waiters = waiter::find_active_by_restaurant(&self.pool, restaurant_id)
            .await
            .map_err(AppError::from)?;

        let mut snapshots = Vec::with_capacity(waiters.len());
        for w in waiters {
            match self.waiter_snapshot(&w.id, days, end_date).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    tracing::warn!(waiter_id = %w.id, error = %e, "Skipping waiter snapshot");
                }
            }
        }
        Ok(snapshots)
    }

    /// Peer statistics over the same window, with defaults when sparse.
    pub async fn peer_stats(
        &self,
        restaurant_id: &str,
        days: u64,
        end_date: NaiveDate,
    ) -> AppResult<PeerStats> {
        let snapshots = self.all_waiter_snapshots(restaurant_id, days, end_date).await?;
        Ok(Self::peer_stats_from(&snapshots))
    }

    /// Pure derivation, exposed for the tier calculator's tests.
    pub fn peer_stats_from(snapshots: &[WaiterSnapshot]) -> PeerStats {
        let defaults = PeerStats::default();

        let turn: Vec<f64> = snapshots
            .iter()
            .map(|s| s.avg_turn_time_minutes)
            .filter(|v| *v > 0.0)
            .collect();
        let tip: Vec<f64> = snapshots
            .iter()
            .map(|s| s.avg_tip_percentage)
            .filter(|v| *v > 0.0)
            .collect();
        let covers: Vec<f64> = snapshots
            .iter()
            .map(|s| s.avg_covers_per_shift)
            .filter(|v| *v > 0.0)
            .collect();

        let or_default = |value: f64, default: f64| if value > 0.0 { value } else { default };

        PeerStats {
            avg_turn_time: or_default(mean(&turn), defaults.avg_turn_time),
            std_turn_time: or_default(std(&turn), defaults.std_turn_time),
            avg_tip_pct: or_default(mean(&tip), defaults.avg_tip_pct),
            std_tip_pct: or_default(std(&tip), defaults.std_tip_pct),
            avg_covers_per_shift: or_default(mean(&covers), defaults.avg_covers_per_shift),
            std_covers_per_shift: or_default(std(&covers), defaults.std_covers_per_shift),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_uses_industry_defaults() {
        let stats = MetricsAggregator::peer_stats_from(&[]);
        assert_eq!(stats.avg_turn_time, 45.0);
        assert_eq!(stats.avg_tip_pct, 18.0);
        assert_eq!(stats.avg_covers_per_shift, 20.0);
    }

    #[test]
    fn peer_stats_reflect_actual_snapshots() {
        let snapshots = vec![
            WaiterSnapshot { avg_turn_time_minutes: 40.0, avg_tip_percentage: 20.0, avg_covers_per_shift: 25.0, ..Default::default() },
            WaiterSnapshot { avg_turn_time_minutes: 50.0, avg_tip_percentage: 16.0, avg_covers_per_shift: 15.0, ..Default::default() },
        ];
        let stats = MetricsAggregator::peer_stats_from(&snapshots);
        assert_eq!(stats.avg_turn_time, 45.0);
        assert_eq!(stats.avg_tip_pct, 18.0);
        assert_eq!(stats.avg_covers_per_shift, 20.0);
        assert!(stats.std_turn_time > 0.0);
    }
}
