//! Metrics Models — pre-computed analytics rollups

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Rollup bucket granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum PeriodType {
    Shift,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

/// Per-waiter rollup keyed by `(waiter_id, period_type, period_start)`
///
/// Recomputation replaces the row (same-key upsert), so re-running the
/// rollup over unchanged visits is byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct WaiterMetricsRow {
    pub id: i64,
    pub restaurant_id: String,
    pub waiter_id: String,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    /// Present for `shift` period rows
    pub shift_id: Option<String>,
    pub total_visits: i64,
    pub total_covers: i64,
    pub tables_served: i64,
    pub total_sales: f64,
    pub total_tips: f64,
    pub avg_tip_percentage: Option<f64>,
    pub avg_check_size: Option<f64>,
    pub avg_turn_time_minutes: Option<f64>,
    pub min_turn_time_minutes: Option<f64>,
    pub max_turn_time_minutes: Option<f64>,
    pub computed_at: i64,
}

/// Restaurant-level rollup keyed by `(restaurant_id, period_type, period_start)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct RestaurantMetricsRow {
    pub id: i64,
    pub restaurant_id: String,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub total_parties: i64,
    pub total_covers: i64,
    pub peak_occupancy: Option<i64>,
    pub total_revenue: f64,
    pub total_tips: f64,
    pub avg_check_size: Option<f64>,
    pub avg_turn_time_minutes: Option<f64>,
    pub avg_wait_time_minutes: Option<f64>,
    pub waiter_count: Option<i64>,
    pub covers_per_waiter: Option<f64>,
    pub computed_at: i64,
}

/// Menu item rollup keyed by `(restaurant_id, menu_item, period_type, period_start)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct MenuItemMetricsRow {
    pub id: i64,
    pub restaurant_id: String,
    pub menu_item: String,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub times_ordered: i64,
    pub total_revenue: f64,
    /// JSON map of hour → order count
    pub hourly_distribution: Option<String>,
    pub computed_at: i64,
}
