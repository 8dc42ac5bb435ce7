//! Restaurant Repository

use shared::models::{Restaurant, RestaurantConfig, RoutingMode};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, name, timezone, config, created_at, updated_at";

pub async fn create(
    pool: &SqlitePool,
    name: &str,
    timezone: &str,
    config: Option<&RestaurantConfig>,
) -> RepoResult<Restaurant> {
    let id = new_id();
    let now = now_millis();
    let config_json = match config {
        Some(cfg) => serde_json::to_string(cfg)
            .map_err(|e| RepoError::Validation(format!("Invalid config: {e}")))?,
        None => "{}".to_string(),
    };

    sqlx::query(
        "INSERT INTO restaurants (id, name, timezone, config, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(timezone)
    .bind(&config_json)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create restaurant".into()))
}

pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<Restaurant>> {
    let restaurants = sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {COLUMNS} FROM restaurants ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(restaurants)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Restaurant>> {
    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {COLUMNS} FROM restaurants WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(restaurant)
}

/// Load a restaurant or fail with NotFound
pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<Restaurant> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Restaurant {id} not found")))
}

/// Replace the whole configuration map
pub async fn update_config(
    pool: &SqlitePool,
    id: &str,
    config: &RestaurantConfig,
) -> RepoResult<Restaurant> {
    let config_json = serde_json::to_string(config)
        .map_err(|e| RepoError::Validation(format!("Invalid config: {e}")))?;

    let rows = sqlx::query("UPDATE restaurants SET config = ?, updated_at = ? WHERE id = ?")
        .bind(&config_json)
        .bind(now_millis())
        .bind(id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Restaurant {id} not found")));
    }
    get(pool, id).await
}

/// Switch the routing mode, preserving the rest of the config map
pub async fn switch_routing_mode(
    pool: &SqlitePool,
    id: &str,
    mode: RoutingMode,
) -> RepoResult<Restaurant> {
    let restaurant = get(pool, id).await?;
    let mut config = restaurant.parsed_config();
    config.routing.mode = mode;
    update_config(pool, id, &config).await
}
