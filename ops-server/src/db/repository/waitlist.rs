//! Waitlist Repository

use shared::models::{LocationPreference, TablePreference, WaitlistEntry};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, restaurant_id, party_name, party_size, table_preference, \
     location_preference, status, quoted_wait_minutes, visit_id, created_at, seated_at";

pub async fn create(
    pool: &SqlitePool,
    restaurant_id: &str,
    party_name: Option<&str>,
    party_size: i64,
    table_preference: TablePreference,
    location_preference: LocationPreference,
    quoted_wait_minutes: Option<i64>,
) -> RepoResult<WaitlistEntry> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO waitlist (id, restaurant_id, party_name, party_size, table_preference, \
         location_preference, status, quoted_wait_minutes, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, 'waiting', ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(party_name)
    .bind(party_size)
    .bind(table_preference)
    .bind(location_preference)
    .bind(quoted_wait_minutes)
    .bind(now_millis())
    .execute(pool)
    .await?;

    get(pool, &id).await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<WaitlistEntry>> {
    let entry =
        sqlx::query_as::<_, WaitlistEntry>(&format!("SELECT {COLUMNS} FROM waitlist WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(entry)
}

pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<WaitlistEntry> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Waitlist entry {id} not found")))
}

/// Link the entry to its visit and mark it seated. Part of the seat
/// transaction; conditional on the entry still waiting.
pub async fn mark_seated<'e, E>(executor: E, id: &str, visit_id: &str, at: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE waitlist SET status = 'seated', visit_id = ?, seated_at = ? \
         WHERE id = ? AND status = 'waiting'",
    )
    .bind(visit_id)
    .bind(at)
    .bind(id)
    .execute(executor)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "Waitlist entry {id} is no longer waiting"
        )));
    }
    Ok(())
}

pub async fn mark_walked_away(pool: &SqlitePool, id: &str) -> RepoResult<WaitlistEntry> {
    let rows = sqlx::query("UPDATE waitlist SET status = 'walked_away' WHERE id = ? AND status = 'waiting'")
        .bind(id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "Waitlist entry {id} is no longer waiting"
        )));
    }
    get(pool, id).await
}

/// Parties still waiting, oldest first
pub async fn find_waiting(pool: &SqlitePool, restaurant_id: &str) -> RepoResult<Vec<WaitlistEntry>> {
    let entries = sqlx::query_as::<_, WaitlistEntry>(&format!(
        "SELECT {COLUMNS} FROM waitlist WHERE restaurant_id = ? AND status = 'waiting' \
         ORDER BY created_at"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Average seated wait over the trailing window, for quoting new parties
pub async fn average_wait_minutes(
    pool: &SqlitePool,
    restaurant_id: &str,
    since_millis: i64,
) -> RepoResult<Option<f64>> {
    let avg: Option<f64> = sqlx::query_scalar(
        "SELECT AVG((seated_at - created_at) / 60000.0) FROM waitlist \
         WHERE restaurant_id = ? AND status = 'seated' AND seated_at >= ?",
    )
    .bind(restaurant_id)
    .bind(since_millis)
    .fetch_one(pool)
    .await?;
    Ok(avg)
}
