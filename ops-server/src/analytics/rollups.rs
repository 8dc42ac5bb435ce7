//! Analytics rollups (C12)
//!
//! Batch derivations over visits, keyed by `(period_type, period_start)`.
//! Same-key upserts make recomputation safe; `computed_at` derives from the
//! newest input row instead of the wall clock so an unchanged visit set
//! reproduces byte-identical rollup rows.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use shared::models::{PeriodType, Visit};
use shared::{AppError, AppResult};
use sqlx::SqlitePool;

use crate::db::repository::metrics::{self, RestaurantMetricsValues, WaiterMetricsValues};
use crate::db::repository::{order_item, shift, visit, waitlist};
use crate::utils::time::{millis_to_date_hour, range_millis, week_start};

pub struct AnalyticsService {
    pool: SqlitePool,
}

/// Per-waiter accumulation while sweeping visits
#[derive(Default)]
struct WaiterAccumulator {
    visits: i64,
    covers: i64,
    sales: f64,
    tips: f64,
    tip_pcts: Vec<f64>,
    turn_times: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Maximum number of simultaneously open visits in the window
fn peak_occupancy(visits: &[Visit], window_end_millis: i64) -> Option<i64> {
    if visits.is_empty() {
        return None;
    }
    let mut events: Vec<(i64, i64)> = Vec::with_capacity(visits.len() * 2);
    for v in visits {
        events.push((v.seated_at, 1));
        events.push((v.cleared_at.unwrap_or(window_end_millis), -1));
    }
    // Clearing sorts before seating at the same instant
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut current = 0i64;
    let mut peak = 0i64;
    for (_, delta) in events {
        current += delta;
        peak = peak.max(current);
    }
    Some(peak)
}

impl AnalyticsService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Normalize the bucket start and compute its `[start, end)` range.
    fn bucket(period_type: PeriodType, period_start: NaiveDate) -> AppResult<(NaiveDate, i64, i64)> {
        match period_type {
            PeriodType::Daily => {
                let (start, end) = range_millis(period_start, 1);
                Ok((period_start, start, end))
            }
            PeriodType::Weekly => {
                let monday = week_start(period_start);
                let (start, end) = range_millis(monday, 7);
                Ok((monday, start, end))
            }
            PeriodType::Monthly => {
                let first = period_start.with_day(1).expect("day 1 is always valid");
                let next = first + Months::new(1);
                let days = (next - first).num_days() as u64;
                let (start, end) = range_millis(first, days);
                Ok((first, start, end))
            }
            PeriodType::Shift => Err(AppError::invalid_request(
                "Use rollup_shift for shift-period rollups",
            )),
            // Hour-of-day detail lives in menu hourly_distribution and the
            // peak-occupancy sweep; there is no hourly row fan-out
            PeriodType::Hourly => Err(AppError::invalid_request(
                "Hourly granularity is derived, not rolled up",
            )),
        }
    }

    /// Recompute waiter, restaurant, and menu rollups for one bucket.
    pub async fn rollup(
        &self,
        restaurant_id: &str,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> AppResult<()> {
        let (bucket_start, start_millis, end_millis) = Self::bucket(period_type, period_start)?;

        let visits =
            visit::find_seated_in_range(&self.pool, restaurant_id, start_millis, end_millis)
                .await
                .map_err(AppError::from)?;
        let order_items =
            order_item::find_in_range(&self.pool, restaurant_id, start_millis, end_millis)
                .await
                .map_err(AppError::from)?;

        // Deterministic stamp: the newest input row in the bucket
        let computed_at = visits
            .iter()
            .map(|v| v.updated_at.unwrap_or(v.seated_at))
            .chain(order_items.iter().map(|o| o.ordered_at))
            .max()
            .unwrap_or(end_millis);

        self.rollup_waiters(restaurant_id, period_type, bucket_start, &visits, computed_at)
            .await?;
        self.rollup_restaurant(
            restaurant_id,
            period_type,
            bucket_start,
            &visits,
            start_millis,
            end_millis,
            computed_at,
        )
        .await?;
        self.rollup_menu(restaurant_id, period_type, bucket_start, &order_items, computed_at)
            .await?;

        tracing::debug!(
            restaurant_id = %restaurant_id,
            period = ?period_type,
            period_start = %bucket_start,
            visits = visits.len(),
            "Rollup recomputed"
        );
        Ok(())
    }

    async fn rollup_waiters(
        &self,
        restaurant_id: &str,
        period_type: PeriodType,
        bucket_start: NaiveDate,
        visits: &[Visit],
        computed_at: i64,
    ) -> AppResult<()> {
        let mut by_waiter: BTreeMap<String, WaiterAccumulator> = BTreeMap::new();
        for v in visits {
            let Some(waiter_id) = &v.waiter_id else {
                continue; // unassigned walk-ins roll up at restaurant level only
            };
            let acc = by_waiter.entry(waiter_id.clone()).or_default();
            acc.visits += 1;
            acc.covers += v.party_size;
            if let Some(total) = v.total {
                acc.sales += total;
            }
            if let Some(tip) = v.tip {
                acc.tips += tip;
            }
            if let Some(pct) = v.tip_percentage {
                acc.tip_pcts.push(pct);
            }
            if let Some(turn) = v.duration_minutes {
                acc.turn_times.push(turn);
            }
        }

        for (waiter_id, acc) in by_waiter {
            let values = WaiterMetricsValues {
                shift_id: None,
                total_visits: acc.visits,
                total_covers: acc.covers,
                tables_served: acc.visits,
                total_sales: acc.sales,
                total_tips: acc.tips,
                avg_tip_percentage: mean(&acc.tip_pcts),
                avg_check_size: if acc.visits > 0 { Some(acc.sales / acc.visits as f64) } else { None },
                avg_turn_time_minutes: mean(&acc.turn_times),
                min_turn_time_minutes: acc.turn_times.iter().cloned().reduce(f64::min),
                max_turn_time_minutes: acc.turn_times.iter().cloned().reduce(f64::max),
            };
            metrics::upsert_waiter_metrics(
                &self.pool,
                restaurant_id,
                &waiter_id,
                period_type,
                bucket_start,
                &values,
                computed_at,
            )
            .await
            .map_err(AppError::from)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn rollup_restaurant(
        &self,
        restaurant_id: &str,
        period_type: PeriodType,
        bucket_start: NaiveDate,
        visits: &[Visit],
        start_millis: i64,
        end_millis: i64,
        computed_at: i64,
    ) -> AppResult<()> {
        let total_parties = visits.len() as i64;
        let total_covers: i64 = visits.iter().map(|v| v.party_size).sum();
        let total_revenue: f64 = visits.iter().filter_map(|v| v.total).sum();
        let total_tips: f64 = visits.iter().filter_map(|v| v.tip).sum();
        let turn_times: Vec<f64> = visits.iter().filter_map(|v| v.duration_minutes).collect();

        let waiter_ids: std::collections::BTreeSet<&String> =
            visits.iter().filter_map(|v| v.waiter_id.as_ref()).collect();
        let waiter_count = if waiter_ids.is_empty() { None } else { Some(waiter_ids.len() as i64) };

        let avg_wait = waitlist::average_wait_minutes(&self.pool, restaurant_id, start_millis)
            .await
            .map_err(AppError::from)?;

        let values = RestaurantMetricsValues {
            total_parties,
            total_covers,
            peak_occupancy: peak_occupancy(visits, end_millis),
            total_revenue,
            total_tips,
            avg_check_size: if total_parties > 0 {
                Some(total_revenue / total_parties as f64)
            } else {
                None
            },
            avg_turn_time_minutes: mean(&turn_times),
            avg_wait_time_minutes: avg_wait,
            waiter_count,
            covers_per_waiter: waiter_count.map(|n| total_covers as f64 / n as f64),
        };

        metrics::upsert_restaurant_metrics(
            &self.pool,
            restaurant_id,
            period_type,
            bucket_start,
            &values,
            computed_at,
        )
        .await
        .map_err(AppError::from)
    }

    async fn rollup_menu(
        &self,
        restaurant_id: &str,
        period_type: PeriodType,
        bucket_start: NaiveDate,
        order_items: &[shared::models::OrderItem],
        computed_at: i64,
    ) -> AppResult<()> {
        // BTreeMaps keep the JSON key order stable across recomputations
        let mut by_item: BTreeMap<String, (i64, f64, BTreeMap<String, i64>)> = BTreeMap::new();
        for item in order_items {
            let entry = by_item.entry(item.menu_item.clone()).or_default();
            entry.0 += item.quantity;
            entry.1 += item.total_price.unwrap_or(0.0);
            let (_, hour) = millis_to_date_hour(item.ordered_at);
            *entry.2.entry(format!("{hour:02}")).or_insert(0) += item.quantity;
        }

        for (menu_item, (orders, revenue, hourly)) in by_item {
            let hourly_json = serde_json::to_string(&hourly)
                .map_err(|e| AppError::internal(e.to_string()))?;
            metrics::upsert_menu_metrics(
                &self.pool,
                restaurant_id,
                &menu_item,
                period_type,
                bucket_start,
                orders,
                revenue,
                Some(&hourly_json),
                computed_at,
            )
            .await
            .map_err(AppError::from)?;
        }
        Ok(())
    }

    /// Shift-period waiter rollup, keyed by the shift's clock-in date.
    pub async fn rollup_shift(&self, shift_id: &str) -> AppResult<()> {
        let s = shift::get(&self.pool, shift_id).await.map_err(AppError::from)?;
        let (date, _) = millis_to_date_hour(s.clock_in);
        let end = s.clock_out.unwrap_or_else(shared::util::now_millis);

        let visits: Vec<Visit> = visit::find_for_waiter_in_range(
            &self.pool,
            &s.waiter_id,
            s.clock_in,
            end + 1,
        )
        .await
        .map_err(AppError::from)?
        .into_iter()
        .filter(|v| v.shift_id.as_deref() == Some(shift_id))
        .collect();

        let mut acc = WaiterAccumulator::default();
        for v in &visits {
            acc.visits += 1;
            acc.covers += v.party_size;
            acc.sales += v.total.unwrap_or(0.0);
            acc.tips += v.tip.unwrap_or(0.0);
            if let Some(pct) = v.tip_percentage {
                acc.tip_pcts.push(pct);
            }
            if let Some(turn) = v.duration_minutes {
                acc.turn_times.push(turn);
            }
        }

        let computed_at = visits
            .iter()
            .map(|v| v.updated_at.unwrap_or(v.seated_at))
            .max()
            .unwrap_or(s.clock_in);

        let values = WaiterMetricsValues {
            shift_id: Some(shift_id.to_string()),
            total_visits: acc.visits,
            total_covers: acc.covers,
            tables_served: acc.visits,
            total_sales: acc.sales,
            total_tips: acc.tips,
            avg_tip_percentage: mean(&acc.tip_pcts),
            avg_check_size: if acc.visits > 0 { Some(acc.sales / acc.visits as f64) } else { None },
            avg_turn_time_minutes: mean(&acc.turn_times),
            min_turn_time_minutes: acc.turn_times.iter().cloned().reduce(f64::min),
            max_turn_time_minutes: acc.turn_times.iter().cloned().reduce(f64::max),
        };

        metrics::upsert_waiter_metrics(
            &self.pool,
            &s.restaurant_id,
            &s.waiter_id,
            PeriodType::Shift,
            date,
            &values,
            computed_at,
        )
        .await
        .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_occupancy_counts_overlap() {
        let mk = |seated: i64, cleared: Option<i64>| Visit {
            id: shared::util::new_id(),
            restaurant_id: "r".into(),
            table_id: "t".into(),
            waiter_id: None,
            shift_id: None,
            waitlist_id: None,
            original_waiter_id: None,
            party_size: 2,
            actual_covers: None,
            seated_at: seated,
            first_served_at: None,
            payment_at: None,
            cleared_at: cleared,
            duration_minutes: None,
            subtotal: None,
            tax: None,
            total: None,
            tip: None,
            tip_percentage: None,
            created_at: None,
            updated_at: None,
        };

        // Three visits: two overlap, the third starts after one clears
        let visits = vec![
            mk(0, Some(100)),
            mk(50, Some(150)),
            mk(120, None),
        ];
        assert_eq!(peak_occupancy(&visits, 1000), Some(2));
        assert_eq!(peak_occupancy(&[], 1000), None);
    }
}
