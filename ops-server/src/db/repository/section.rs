//! Section Repository

use shared::models::Section;
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::RepoResult;

pub async fn create(
    pool: &SqlitePool,
    restaurant_id: &str,
    name: &str,
    position: i64,
) -> RepoResult<Section> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO sections (id, restaurant_id, name, position, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(name)
    .bind(position)
    .bind(now_millis())
    .execute(pool)
    .await?;

    let section = sqlx::query_as::<_, Section>(
        "SELECT id, restaurant_id, name, position, created_at FROM sections WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(section)
}

pub async fn find_by_restaurant(pool: &SqlitePool, restaurant_id: &str) -> RepoResult<Vec<Section>> {
    let sections = sqlx::query_as::<_, Section>(
        "SELECT id, restaurant_id, name, position, created_at FROM sections \
         WHERE restaurant_id = ? ORDER BY position, name",
    )
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(sections)
}
