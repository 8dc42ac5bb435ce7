//! Visit Repository

use shared::models::{Visit, VisitTotals};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, restaurant_id, table_id, waiter_id, shift_id, waitlist_id, \
     original_waiter_id, party_size, actual_covers, seated_at, first_served_at, payment_at, \
     cleared_at, duration_minutes, subtotal, tax, total, tip, tip_percentage, created_at, updated_at";

/// Insert a new open visit. Part of the seat transaction; callers pass the
/// executor so the visit, table CAS, and shift stats commit together.
#[allow(clippy::too_many_arguments)]
pub async fn insert<'e, E>(
    executor: E,
    restaurant_id: &str,
    table_id: &str,
    waiter_id: Option<&str>,
    shift_id: Option<&str>,
    waitlist_id: Option<&str>,
    party_size: i64,
    seated_at: i64,
) -> RepoResult<String>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let id = new_id();
    sqlx::query(
        "INSERT INTO visits (id, restaurant_id, table_id, waiter_id, shift_id, waitlist_id, \
         party_size, seated_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(table_id)
    .bind(waiter_id)
    .bind(shift_id)
    .bind(waitlist_id)
    .bind(party_size)
    .bind(seated_at)
    .bind(seated_at)
    .bind(seated_at)
    .execute(executor)
    .await?;
    Ok(id)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Visit>> {
    let visit = sqlx::query_as::<_, Visit>(&format!("SELECT {COLUMNS} FROM visits WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(visit)
}

pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<Visit> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Visit {id} not found")))
}

/// The open visit currently occupying a table, if any
pub async fn find_open_by_table(pool: &SqlitePool, table_id: &str) -> RepoResult<Option<Visit>> {
    let visit = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {COLUMNS} FROM visits WHERE table_id = ? AND cleared_at IS NULL \
         ORDER BY seated_at DESC LIMIT 1"
    ))
    .bind(table_id)
    .fetch_optional(pool)
    .await?;
    Ok(visit)
}

/// Record the first-served milestone (idempotent: first write wins)
pub async fn mark_first_served(pool: &SqlitePool, id: &str, at: i64) -> RepoResult<()> {
    sqlx::query(
        "UPDATE visits SET first_served_at = ?, updated_at = ? \
         WHERE id = ? AND first_served_at IS NULL AND cleared_at IS NULL",
    )
    .bind(at)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Attach the payment summary; tip percentage derives from total + tip
pub async fn set_totals(pool: &SqlitePool, id: &str, totals: VisitTotals) -> RepoResult<Visit> {
    if totals.total < 0.0 || totals.tip < 0.0 {
        return Err(RepoError::Validation("Amounts cannot be negative".into()));
    }
    let tip_pct = if totals.total > 0.0 {
        Some(totals.tip / totals.total * 100.0)
    } else {
        None
    };
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE visits SET subtotal = ?, tax = ?, total = ?, tip = ?, tip_percentage = ?, \
         payment_at = COALESCE(payment_at, ?), updated_at = ? WHERE id = ? AND cleared_at IS NULL",
    )
    .bind(totals.subtotal)
    .bind(totals.tax)
    .bind(totals.total)
    .bind(totals.tip)
    .bind(tip_pct)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!("Visit {id} already cleared")));
    }
    get(pool, id).await
}

/// Close the visit: set cleared_at and derive duration. Conditional on the
/// visit still being open; the table transition happens in the service.
pub async fn close<'e, E>(executor: E, id: &str, cleared_at: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE visits SET cleared_at = ?, \
         duration_minutes = (? - seated_at) / 60000.0, updated_at = ? \
         WHERE id = ? AND cleared_at IS NULL",
    )
    .bind(cleared_at)
    .bind(cleared_at)
    .bind(cleared_at)
    .bind(id)
    .execute(executor)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!("Visit {id} already cleared")));
    }
    Ok(())
}

/// Record covers observed by the classifier
pub async fn set_actual_covers(pool: &SqlitePool, id: &str, covers: i64) -> RepoResult<()> {
    sqlx::query("UPDATE visits SET actual_covers = ?, updated_at = ? WHERE id = ?")
        .bind(covers)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Transfer a visit to another waiter, retaining the original
pub async fn transfer(pool: &SqlitePool, id: &str, new_waiter_id: &str, new_shift_id: &str) -> RepoResult<Visit> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE visits SET original_waiter_id = COALESCE(original_waiter_id, waiter_id), \
         waiter_id = ?, shift_id = ?, updated_at = ? WHERE id = ? AND cleared_at IS NULL",
    )
    .bind(new_waiter_id)
    .bind(new_shift_id)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!("Visit {id} already cleared")));
    }
    get(pool, id).await
}

/// Visits seated within `[start, end)` millis for a restaurant
pub async fn find_seated_in_range(
    pool: &SqlitePool,
    restaurant_id: &str,
    start_millis: i64,
    end_millis: i64,
) -> RepoResult<Vec<Visit>> {
    let visits = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {COLUMNS} FROM visits WHERE restaurant_id = ? AND seated_at >= ? AND seated_at < ? \
         ORDER BY seated_at"
    ))
    .bind(restaurant_id)
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await?;
    Ok(visits)
}

/// Visits for one waiter seated within `[start, end)` millis
pub async fn find_for_waiter_in_range(
    pool: &SqlitePool,
    waiter_id: &str,
    start_millis: i64,
    end_millis: i64,
) -> RepoResult<Vec<Visit>> {
    let visits = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {COLUMNS} FROM visits WHERE waiter_id = ? AND seated_at >= ? AND seated_at < ? \
         ORDER BY seated_at"
    ))
    .bind(waiter_id)
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await?;
    Ok(visits)
}
