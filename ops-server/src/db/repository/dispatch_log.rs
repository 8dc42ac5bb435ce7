//! Crop Dispatch Log Repository
//!
//! `(camera_id, json_table_id, frame_index)` is unique: the first insert
//! wins and every later attempt observes `Duplicate`. The dispatcher's
//! idempotence rests entirely on this key.

use shared::models::CropDispatchLog;
use shared::util::now_millis;
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, camera_id, json_table_id, frame_index, status, attempts, last_error, \
     dispatched_at, completed_at, created_at";

/// Outcome of an append attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New row created with this id; the caller owns the dispatch
    Inserted(i64),
    /// The key already exists; someone else dispatched this crop
    Duplicate,
}

/// Claim the dedupe key. `INSERT OR IGNORE` keeps this race-free: exactly
/// one concurrent caller gets `Inserted`.
pub async fn try_append(
    pool: &SqlitePool,
    camera_id: &str,
    json_table_id: &str,
    frame_index: i64,
) -> RepoResult<AppendOutcome> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO crop_dispatch_log \
         (camera_id, json_table_id, frame_index, status, created_at) \
         VALUES (?, ?, ?, 'queued', ?)",
    )
    .bind(camera_id)
    .bind(json_table_id)
    .bind(frame_index)
    .bind(now_millis())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(AppendOutcome::Duplicate);
    }
    Ok(AppendOutcome::Inserted(result.last_insert_rowid()))
}

/// queued → dispatched, stamping the first attempt
pub async fn mark_dispatched(pool: &SqlitePool, id: i64, attempts: i64) -> RepoResult<()> {
    sqlx::query(
        "UPDATE crop_dispatch_log SET status = 'dispatched', attempts = ?, dispatched_at = ? \
         WHERE id = ?",
    )
    .bind(attempts)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// dispatched → succeeded
pub async fn mark_succeeded(pool: &SqlitePool, id: i64, attempts: i64) -> RepoResult<()> {
    sqlx::query(
        "UPDATE crop_dispatch_log SET status = 'succeeded', attempts = ?, completed_at = ? \
         WHERE id = ?",
    )
    .bind(attempts)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal failure after retries (or a non-retryable error)
pub async fn mark_failed(
    pool: &SqlitePool,
    id: i64,
    attempts: i64,
    error: &str,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE crop_dispatch_log SET status = 'failed', attempts = ?, last_error = ?, completed_at = ? \
         WHERE id = ?",
    )
    .bind(attempts)
    .bind(error)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_key(
    pool: &SqlitePool,
    camera_id: &str,
    json_table_id: &str,
    frame_index: i64,
) -> RepoResult<Option<CropDispatchLog>> {
    let row = sqlx::query_as::<_, CropDispatchLog>(&format!(
        "SELECT {COLUMNS} FROM crop_dispatch_log \
         WHERE camera_id = ? AND json_table_id = ? AND frame_index = ?"
    ))
    .bind(camera_id)
    .bind(json_table_id)
    .bind(frame_index)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<CropDispatchLog> {
    let row = sqlx::query_as::<_, CropDispatchLog>(&format!(
        "SELECT {COLUMNS} FROM crop_dispatch_log WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| RepoError::NotFound(format!("Dispatch log {id} not found")))
}

/// Recent rows for a camera, newest first (observability endpoints)
pub async fn find_recent(
    pool: &SqlitePool,
    camera_id: &str,
    limit: i64,
) -> RepoResult<Vec<CropDispatchLog>> {
    let rows = sqlx::query_as::<_, CropDispatchLog>(&format!(
        "SELECT {COLUMNS} FROM crop_dispatch_log WHERE camera_id = ? \
         ORDER BY created_at DESC, id DESC LIMIT ?"
    ))
    .bind(camera_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
