//! Shift Repository

use shared::models::{Shift, ShiftStatus};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, restaurant_id, waiter_id, section_id, status, clock_in, clock_out, \
     tables_served, total_covers, total_tips, total_sales, created_at, updated_at";

/// Open a shift. The partial unique index rejects a second non-ended shift
/// for the same waiter.
pub async fn clock_in(
    pool: &SqlitePool,
    restaurant_id: &str,
    waiter_id: &str,
    section_id: Option<&str>,
) -> RepoResult<Shift> {
    let id = new_id();
    let now = now_millis();
    let result = sqlx::query(
        "INSERT INTO shifts (id, restaurant_id, waiter_id, section_id, status, clock_in, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 'active', ?, ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(waiter_id)
    .bind(section_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    if let Err(e) = result {
        let repo_err = RepoError::from(e);
        if matches!(repo_err, RepoError::Duplicate(_)) {
            return Err(RepoError::Duplicate(format!(
                "Waiter {waiter_id} already has an open shift"
            )));
        }
        return Err(repo_err);
    }

    get(pool, &id).await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(&format!("SELECT {COLUMNS} FROM shifts WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(shift)
}

pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<Shift> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Shift {id} not found")))
}

/// The waiter's open (active or on-break) shift, if any
pub async fn find_open_for_waiter(pool: &SqlitePool, waiter_id: &str) -> RepoResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(&format!(
        "SELECT {COLUMNS} FROM shifts WHERE waiter_id = ? AND status != 'ended' LIMIT 1"
    ))
    .bind(waiter_id)
    .fetch_optional(pool)
    .await?;
    Ok(shift)
}

/// Toggle break status; only open shifts can move between active/on_break
pub async fn set_status(pool: &SqlitePool, id: &str, status: ShiftStatus) -> RepoResult<Shift> {
    if status == ShiftStatus::Ended {
        return Err(RepoError::Validation(
            "Use clock_out to end a shift".into(),
        ));
    }
    let rows = sqlx::query("UPDATE shifts SET status = ?, updated_at = ? WHERE id = ? AND status != 'ended'")
        .bind(status)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!("Shift {id} not open")));
    }
    get(pool, id).await
}

/// Close a shift and fold its aggregates into the waiter's lifetime totals.
///
/// Conditional on the shift still being open; the whole operation is one
/// transaction so the totals never double-count.
pub async fn clock_out(pool: &SqlitePool, id: &str) -> RepoResult<Shift> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE shifts SET status = 'ended', clock_out = ?, updated_at = ? \
         WHERE id = ? AND status != 'ended'",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!("Shift {id} already ended")));
    }

    sqlx::query(
        "UPDATE waiters SET \
             total_shifts = total_shifts + 1, \
             total_covers = total_covers + (SELECT total_covers FROM shifts WHERE id = ?), \
             total_tips = total_tips + (SELECT total_tips FROM shifts WHERE id = ?), \
             updated_at = ? \
         WHERE id = (SELECT waiter_id FROM shifts WHERE id = ?)",
    )
    .bind(id)
    .bind(id)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    get(pool, id).await
}

/// Bump service counters when a party is seated
pub async fn add_service_stats(
    pool: &SqlitePool,
    shift_id: &str,
    tables_delta: i64,
    covers_delta: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE shifts SET tables_served = tables_served + ?, total_covers = total_covers + ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(tables_delta)
    .bind(covers_delta)
    .bind(now_millis())
    .bind(shift_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fold money into the shift when a check closes
pub async fn add_money(
    pool: &SqlitePool,
    shift_id: &str,
    tips_delta: f64,
    sales_delta: f64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE shifts SET total_tips = total_tips + ?, total_sales = total_sales + ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(tips_delta)
    .bind(sales_delta)
    .bind(now_millis())
    .bind(shift_id)
    .execute(pool)
    .await?;
    Ok(())
}
