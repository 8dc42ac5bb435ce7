//! Metrics Rollup Repository
//!
//! All writes are same-key upserts so recomputation replaces rows in place;
//! re-running a rollup over unchanged visits is byte-identical.

use chrono::NaiveDate;
use shared::models::{MenuItemMetricsRow, PeriodType, RestaurantMetricsRow, WaiterMetricsRow};
use sqlx::SqlitePool;

use super::RepoResult;

const WAITER_COLUMNS: &str = "id, restaurant_id, waiter_id, period_type, period_start, shift_id, \
     total_visits, total_covers, tables_served, total_sales, total_tips, avg_tip_percentage, \
     avg_check_size, avg_turn_time_minutes, min_turn_time_minutes, max_turn_time_minutes, computed_at";
const RESTAURANT_COLUMNS: &str = "id, restaurant_id, period_type, period_start, total_parties, \
     total_covers, peak_occupancy, total_revenue, total_tips, avg_check_size, \
     avg_turn_time_minutes, avg_wait_time_minutes, waiter_count, covers_per_waiter, computed_at";
const MENU_COLUMNS: &str = "id, restaurant_id, menu_item, period_type, period_start, \
     times_ordered, total_revenue, hourly_distribution, computed_at";

/// Values for a waiter rollup row (id and key fields supplied separately)
#[derive(Debug, Clone, Default)]
pub struct WaiterMetricsValues {
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
}

pub async fn upsert_waiter_metrics(
    pool: &SqlitePool,
    restaurant_id: &str,
    waiter_id: &str,
    period_type: PeriodType,
    period_start: NaiveDate,
    values: &WaiterMetricsValues,
    computed_at: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO waiter_metrics (restaurant_id, waiter_id, period_type, period_start, shift_id, \
         total_visits, total_covers, tables_served, total_sales, total_tips, avg_tip_percentage, \
         avg_check_size, avg_turn_time_minutes, min_turn_time_minutes, max_turn_time_minutes, computed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(waiter_id, period_type, period_start) DO UPDATE SET \
             shift_id = excluded.shift_id, \
             total_visits = excluded.total_visits, \
             total_covers = excluded.total_covers, \
             tables_served = excluded.tables_served, \
             total_sales = excluded.total_sales, \
             total_tips = excluded.total_tips, \
             avg_tip_percentage = excluded.avg_tip_percentage, \
             avg_check_size = excluded.avg_check_size, \
             avg_turn_time_minutes = excluded.avg_turn_time_minutes, \
             min_turn_time_minutes = excluded.min_turn_time_minutes, \
             max_turn_time_minutes = excluded.max_turn_time_minutes, \
             computed_at = excluded.computed_at",
    )
    .bind(restaurant_id)
    .bind(waiter_id)
    .bind(period_type)
    .bind(period_start)
    .bind(&values.shift_id)
    .bind(values.total_visits)
    .bind(values.total_covers)
    .bind(values.tables_served)
    .bind(values.total_sales)
    .bind(values.total_tips)
    .bind(values.avg_tip_percentage)
    .bind(values.avg_check_size)
    .bind(values.avg_turn_time_minutes)
    .bind(values.min_turn_time_minutes)
    .bind(values.max_turn_time_minutes)
    .bind(computed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_waiter_metrics(
    pool: &SqlitePool,
    waiter_id: &str,
    period_type: PeriodType,
    period_start: NaiveDate,
) -> RepoResult<Option<WaiterMetricsRow>> {
    let row = sqlx::query_as::<_, WaiterMetricsRow>(&format!(
        "SELECT {WAITER_COLUMNS} FROM waiter_metrics \
         WHERE waiter_id = ? AND period_type = ? AND period_start = ?"
    ))
    .bind(waiter_id)
    .bind(period_type)
    .bind(period_start)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Values for a restaurant rollup row
#[derive(Debug, Clone, Default)]
pub struct RestaurantMetricsValues {
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
}

pub async fn upsert_restaurant_metrics(
    pool: &SqlitePool,
    restaurant_id: &str,
    period_type: PeriodType,
    period_start: NaiveDate,
    values: &RestaurantMetricsValues,
    computed_at: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO restaurant_metrics (restaurant_id, period_type, period_start, total_parties, \
         total_covers, peak_occupancy, total_revenue, total_tips, avg_check_size, \
         avg_turn_time_minutes, avg_wait_time_minutes, waiter_count, covers_per_waiter, computed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(restaurant_id, period_type, period_start) DO UPDATE SET \
             total_parties = excluded.total_parties, \
             total_covers = excluded.total_covers, \
             peak_occupancy = excluded.peak_occupancy, \
             total_revenue = excluded.total_revenue, \
             total_tips = excluded.total_tips, \
             avg_check_size = excluded.avg_check_size, \
             avg_turn_time_minutes = excluded.avg_turn_time_minutes, \
             avg_wait_time_minutes = excluded.avg_wait_time_minutes, \
             waiter_count = excluded.waiter_count, \
             covers_per_waiter = excluded.covers_per_waiter, \
             computed_at = excluded.computed_at",
    )
    .bind(restaurant_id)
    .bind(period_type)
    .bind(period_start)
    .bind(values.total_parties)
    .bind(values.total_covers)
    .bind(values.peak_occupancy)
    .bind(values.total_revenue)
    .bind(values.total_tips)
    .bind(values.avg_check_size)
    .bind(values.avg_turn_time_minutes)
    .bind(values.avg_wait_time_minutes)
    .bind(values.waiter_count)
    .bind(values.covers_per_waiter)
    .bind(computed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_restaurant_metrics(
    pool: &SqlitePool,
    restaurant_id: &str,
    period_type: PeriodType,
    period_start: NaiveDate,
) -> RepoResult<Option<RestaurantMetricsRow>> {
    let row = sqlx::query_as::<_, RestaurantMetricsRow>(&format!(
        "SELECT {RESTAURANT_COLUMNS} FROM restaurant_metrics \
         WHERE restaurant_id = ? AND period_type = ? AND period_start = ?"
    ))
    .bind(restaurant_id)
    .bind(period_type)
    .bind(period_start)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn upsert_menu_metrics(
    pool: &SqlitePool,
    restaurant_id: &str,
    menu_item: &str,
    period_type: PeriodType,
    period_start: NaiveDate,
    times_ordered: i64,
    total_revenue: f64,
    hourly_distribution: Option<&str>,
    computed_at: i64,
) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO menu_item_metrics (restaurant_id, menu_item, period_type, period_start, \
         times_ordered, total_revenue, hourly_distribution, computed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(restaurant_id, menu_item, period_type, period_start) DO UPDATE SET \
             times_ordered = excluded.times_ordered, \
             total_revenue = excluded.total_revenue, \
             hourly_distribution = excluded.hourly_distribution, \
             computed_at = excluded.computed_at",
    )
    .bind(restaurant_id)
    .bind(menu_item)
    .bind(period_type)
    .bind(period_start)
    .bind(times_ordered)
    .bind(total_revenue)
    .bind(hourly_distribution)
    .bind(computed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_menu_metrics(
    pool: &SqlitePool,
    restaurant_id: &str,
    period_type: PeriodType,
    period_start: NaiveDate,
) -> RepoResult<Vec<MenuItemMetricsRow>> {
    let rows = sqlx::query_as::<_, MenuItemMetricsRow>(&format!(
        "SELECT {MENU_COLUMNS} FROM menu_item_metrics \
         WHERE restaurant_id = ? AND period_type = ? AND period_start = ? ORDER BY menu_item"
    ))
    .bind(restaurant_id)
    .bind(period_type)
    .bind(period_start)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
