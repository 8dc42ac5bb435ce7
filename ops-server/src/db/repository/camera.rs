//! Camera Repository

use std::collections::HashMap;

use shared::models::{Camera, CropJson};
use shared::util::now_millis;
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "camera_id, restaurant_id, video_source, crop_json, table_map, \
     last_capture_ts, last_frame_index, degraded, created_at, updated_at";

/// Register a camera or update its video source (upsert by camera_id)
pub async fn register(
    pool: &SqlitePool,
    camera_id: &str,
    restaurant_id: &str,
    video_source: &str,
) -> RepoResult<Camera> {
    let now = now_millis();
    sqlx::query(
        "INSERT INTO cameras (camera_id, restaurant_id, video_source, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(camera_id) DO UPDATE SET video_source = excluded.video_source, updated_at = excluded.updated_at",
    )
    .bind(camera_id)
    .bind(restaurant_id)
    .bind(video_source)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, camera_id).await
}

pub async fn find_by_id(pool: &SqlitePool, camera_id: &str) -> RepoResult<Option<Camera>> {
    let camera =
        sqlx::query_as::<_, Camera>(&format!("SELECT {COLUMNS} FROM cameras WHERE camera_id = ?"))
            .bind(camera_id)
            .fetch_optional(pool)
            .await?;
    Ok(camera)
}

pub async fn get(pool: &SqlitePool, camera_id: &str) -> RepoResult<Camera> {
    find_by_id(pool, camera_id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Camera {camera_id} not registered")))
}

pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<Camera>> {
    let cameras =
        sqlx::query_as::<_, Camera>(&format!("SELECT {COLUMNS} FROM cameras ORDER BY camera_id"))
            .fetch_all(pool)
            .await?;
    Ok(cameras)
}

/// Install a crop JSON and its json-table → physical-table map.
///
/// Installation is the cache-invalidation point: workers reload the
/// document at the next tick, so no stale mapping survives an install.
pub async fn install_crop_json(
    pool: &SqlitePool,
    camera_id: &str,
    crop_json: &CropJson,
    table_map: &HashMap<String, String>,
) -> RepoResult<Camera> {
    let crop_raw = serde_json::to_string(crop_json)
        .map_err(|e| RepoError::Validation(format!("Invalid crop JSON: {e}")))?;
    let map_raw = serde_json::to_string(table_map)
        .map_err(|e| RepoError::Validation(format!("Invalid table map: {e}")))?;

    let rows = sqlx::query(
        "UPDATE cameras SET crop_json = ?, table_map = ?, updated_at = ? WHERE camera_id = ?",
    )
    .bind(&crop_raw)
    .bind(&map_raw)
    .bind(now_millis())
    .bind(camera_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Camera {camera_id} not registered")));
    }
    get(pool, camera_id).await
}

/// Bookkeeping after a capture tick
pub async fn update_capture_state(
    pool: &SqlitePool,
    camera_id: &str,
    last_capture_ts: i64,
    last_frame_index: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE cameras SET last_capture_ts = ?, last_frame_index = ?, degraded = 0, updated_at = ? \
         WHERE camera_id = ?",
    )
    .bind(last_capture_ts)
    .bind(last_frame_index)
    .bind(now_millis())
    .bind(camera_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Flag a camera whose frame source is failing; cleared on next success
pub async fn set_degraded(pool: &SqlitePool, camera_id: &str, degraded: bool) -> RepoResult<()> {
    sqlx::query("UPDATE cameras SET degraded = ?, updated_at = ? WHERE camera_id = ?")
        .bind(degraded)
        .bind(now_millis())
        .bind(camera_id)
        .execute(pool)
        .await?;
    Ok(())
}
