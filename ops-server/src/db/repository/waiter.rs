//! Waiter Repository

use serde::Serialize;
use shared::models::{ShiftStatus, Waiter, WaiterCreate, WaiterRole, WaiterTier};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, restaurant_id, name, email, phone, role, tier, composite_score, \
     tier_updated_at, total_shifts, total_covers, total_tips, is_active, created_at, updated_at";

/// A waiter joined with their open shift — the router's candidate view
///
/// `current_tables` counts uncleared visits on the shift; `last_seated_at`
/// feeds the recency penalty.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CandidateWaiter {
    pub waiter_id: String,
    pub name: String,
    pub role: WaiterRole,
    pub tier: WaiterTier,
    pub composite_score: f64,
    pub shift_id: String,
    pub section_id: Option<String>,
    pub shift_status: ShiftStatus,
    pub shift_covers: i64,
    pub shift_tips: f64,
    pub current_tables: i64,
    pub last_seated_at: Option<i64>,
}

pub async fn create(
    pool: &SqlitePool,
    restaurant_id: &str,
    data: WaiterCreate,
) -> RepoResult<Waiter> {
    let id = new_id();
    let now = now_millis();
    sqlx::query(
        "INSERT INTO waiters (id, restaurant_id, name, email, phone, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(&data.name)
    .bind(&data.email)
    .bind(&data.phone)
    .bind(data.role)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Waiter>> {
    let waiter = sqlx::query_as::<_, Waiter>(&format!("SELECT {COLUMNS} FROM waiters WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(waiter)
}

pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<Waiter> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Waiter {id} not found")))
}

pub async fn find_active_by_restaurant(
    pool: &SqlitePool,
    restaurant_id: &str,
) -> RepoResult<Vec<Waiter>> {
    let waiters = sqlx::query_as::<_, Waiter>(&format!(
        "SELECT {COLUMNS} FROM waiters WHERE restaurant_id = ? AND is_active = 1 ORDER BY name"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(waiters)
}

/// Waiters on non-ended shifts, with shift snapshot and service load.
///
/// This is the State Store's `list_candidate_waiters`: hosts, bussers and
/// runners are filtered out by the router, not here.
pub async fn list_candidate_waiters(
    pool: &SqlitePool,
    restaurant_id: &str,
) -> RepoResult<Vec<CandidateWaiter>> {
    let rows = sqlx::query_as::<_, CandidateWaiter>(
        "SELECT w.id AS waiter_id, w.name, w.role, w.tier, w.composite_score, \
                s.id AS shift_id, s.section_id, s.status AS shift_status, \
                s.total_covers AS shift_covers, s.total_tips AS shift_tips, \
                (SELECT COUNT(*) FROM visits v WHERE v.shift_id = s.id AND v.cleared_at IS NULL) AS current_tables, \
                (SELECT MAX(v.seated_at) FROM visits v WHERE v.shift_id = s.id) AS last_seated_at \
         FROM waiters w \
         JOIN shifts s ON s.waiter_id = w.id \
         WHERE w.restaurant_id = ? AND w.is_active = 1 AND s.status != 'ended' \
         ORDER BY w.id",
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Write a recomputed tier and composite score
pub async fn update_tier(
    pool: &SqlitePool,
    waiter_id: &str,
    tier: WaiterTier,
    composite_score: f64,
) -> RepoResult<()> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE waiters SET tier = ?, composite_score = ?, tier_updated_at = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(tier)
    .bind(composite_score)
    .bind(now)
    .bind(now)
    .bind(waiter_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Waiter {waiter_id} not found")));
    }
    Ok(())
}
